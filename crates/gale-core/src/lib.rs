//! gale-core: Handle-addressed request descriptor registry
//!
//! This library is the process-side owner of request descriptors crossing an
//! embedding boundary. Callers on the far side hold opaque `u64` handles;
//! every accessor and mutator goes through [`RequestRegistry`], which checks
//! handle liveness and the per-descriptor read-only gate on each call.
//!
//! ## Features
//! - `serde` - Serialize/Deserialize for the descriptor model types

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod classify;
pub mod error;
pub mod handle;
pub mod header;
pub mod post_data;
pub mod registry;
pub mod request;

// Re-exports
pub use classify::{ResourceType, TransitionQualifiers, TransitionSource, TransitionType};
pub use error::{Error, Result};
pub use handle::{Handle, PostDataHandle, RequestHandle};
pub use header::{HeaderEntry, HeaderMap};
pub use post_data::{PostData, PostDataElement, SharedPostData};
pub use registry::RequestRegistry;
pub use request::{ReferrerPolicy, RequestBuilder, RequestDescriptor, RequestFlags};

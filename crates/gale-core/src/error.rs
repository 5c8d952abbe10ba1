//! Error types for gale-core

use thiserror::Error;

/// Result type alias for gale operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the gale request descriptor boundary
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Operation addressed a handle that was already disposed or never issued
    #[error("stale or unknown handle: {handle:#018x}")]
    StaleHandle { handle: u64 },

    /// Mutating call on a read-only descriptor
    #[error("descriptor is read-only")]
    ReadOnly,

    /// Raw value outside the referrer policy set
    #[error("invalid referrer policy value: {0}")]
    InvalidReferrerPolicy(u32),

    /// Handle index space exhausted
    #[error("registry is full")]
    RegistryFull,
}

//! `#[repr(C)]` types and raw-value constants for the boundary.
//!
//! # Design
//! Handles cross as plain `u64` (0 = null/absent) and enumerated values as
//! `u32` codes, so the only structured types the boundary needs are the
//! header exchange shapes: `*mut c_char` instead of `String`, raw
//! pointer + length instead of a map. Conversion helpers live here to keep
//! `lib.rs` focused on the `extern "C"` surface.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use gale_core::HeaderMap;

// ---------------------------------------------------------------------------
// Header exchange types
// ---------------------------------------------------------------------------

/// A single header as a name/value pair of C strings.
///
/// Instances inside a `GaleHeaderList` are owned by the library and released
/// together with the list by `gale_header_list_free`.
#[repr(C)]
pub struct GaleHeader {
    pub name: *mut c_char,
    pub value: *mut c_char,
}

/// A header set in insertion order, as returned by `gale_request_header_map`.
///
/// Repeated names appear as separate entries. The caller must release the
/// list with `gale_header_list_free`.
#[repr(C)]
pub struct GaleHeaderList {
    pub items: *mut GaleHeader,
    pub len: usize,
}

/// Caller-provided header input for `gale_request_set_header_map` and
/// `gale_request_set`.
///
/// The library copies out of these fields and never frees them.
#[repr(C)]
pub struct GaleHeaderInput {
    pub name: *const c_char,
    pub value: *const c_char,
}

// ---------------------------------------------------------------------------
// Referrer policy codes
// ---------------------------------------------------------------------------

pub const GALE_REFERRER_POLICY_NO_REFERRER: u32 = 0;
pub const GALE_REFERRER_POLICY_NO_REFERRER_WHEN_DOWNGRADE: u32 = 1;
pub const GALE_REFERRER_POLICY_ORIGIN: u32 = 2;
pub const GALE_REFERRER_POLICY_SAME_ORIGIN: u32 = 3;
pub const GALE_REFERRER_POLICY_ORIGIN_WHEN_CROSS_ORIGIN: u32 = 4;
pub const GALE_REFERRER_POLICY_UNSAFE_URL: u32 = 5;
pub const GALE_REFERRER_POLICY_STRICT_ORIGIN: u32 = 6;
pub const GALE_REFERRER_POLICY_STRICT_ORIGIN_WHEN_CROSS_ORIGIN: u32 = 7;

// ---------------------------------------------------------------------------
// Request flag bits
// ---------------------------------------------------------------------------

pub const GALE_REQUEST_FLAG_NONE: u32 = 0;
pub const GALE_REQUEST_FLAG_SKIP_CACHE: u32 = 1 << 0;
pub const GALE_REQUEST_FLAG_ONLY_FROM_CACHE: u32 = 1 << 1;
pub const GALE_REQUEST_FLAG_DISABLE_CACHE: u32 = 1 << 2;
pub const GALE_REQUEST_FLAG_ALLOW_STORED_CREDENTIALS: u32 = 1 << 3;
pub const GALE_REQUEST_FLAG_REPORT_UPLOAD_PROGRESS: u32 = 1 << 4;
pub const GALE_REQUEST_FLAG_NO_DOWNLOAD_DATA: u32 = 1 << 5;
pub const GALE_REQUEST_FLAG_NO_RETRY_ON_5XX: u32 = 1 << 6;
pub const GALE_REQUEST_FLAG_STOP_ON_REDIRECT: u32 = 1 << 7;

// ---------------------------------------------------------------------------
// Resource type codes
// ---------------------------------------------------------------------------

pub const GALE_RESOURCE_TYPE_MAIN_FRAME: u32 = 0;
pub const GALE_RESOURCE_TYPE_SUB_FRAME: u32 = 1;
pub const GALE_RESOURCE_TYPE_STYLESHEET: u32 = 2;
pub const GALE_RESOURCE_TYPE_SCRIPT: u32 = 3;
pub const GALE_RESOURCE_TYPE_IMAGE: u32 = 4;
pub const GALE_RESOURCE_TYPE_FONT_RESOURCE: u32 = 5;
pub const GALE_RESOURCE_TYPE_SUB_RESOURCE: u32 = 6;
pub const GALE_RESOURCE_TYPE_OBJECT: u32 = 7;
pub const GALE_RESOURCE_TYPE_MEDIA: u32 = 8;
pub const GALE_RESOURCE_TYPE_WORKER: u32 = 9;
pub const GALE_RESOURCE_TYPE_SHARED_WORKER: u32 = 10;
pub const GALE_RESOURCE_TYPE_PREFETCH: u32 = 11;
pub const GALE_RESOURCE_TYPE_FAVICON: u32 = 12;
pub const GALE_RESOURCE_TYPE_XHR: u32 = 13;
pub const GALE_RESOURCE_TYPE_PING: u32 = 14;
pub const GALE_RESOURCE_TYPE_SERVICE_WORKER: u32 = 15;
pub const GALE_RESOURCE_TYPE_PLUGIN_RESOURCE: u32 = 16;

// ---------------------------------------------------------------------------
// Transition type codes
// ---------------------------------------------------------------------------

pub const GALE_TRANSITION_SOURCE_LINK: u32 = 0;
pub const GALE_TRANSITION_SOURCE_TYPED: u32 = 1;
pub const GALE_TRANSITION_SOURCE_AUTO_BOOKMARK: u32 = 2;
pub const GALE_TRANSITION_SOURCE_AUTO_SUBFRAME: u32 = 3;
pub const GALE_TRANSITION_SOURCE_MANUAL_SUBFRAME: u32 = 4;
pub const GALE_TRANSITION_SOURCE_FORM_SUBMIT: u32 = 5;
pub const GALE_TRANSITION_SOURCE_RELOAD: u32 = 6;

pub const GALE_TRANSITION_QUALIFIER_FORWARD_BACK: u32 = 0x0100_0000;
pub const GALE_TRANSITION_QUALIFIER_FROM_ADDRESS_BAR: u32 = 0x0200_0000;
pub const GALE_TRANSITION_QUALIFIER_HOME_PAGE: u32 = 0x0400_0000;
pub const GALE_TRANSITION_QUALIFIER_CLIENT_REDIRECT: u32 = 0x4000_0000;
pub const GALE_TRANSITION_QUALIFIER_SERVER_REDIRECT: u32 = 0x8000_0000;

pub const GALE_TRANSITION_SOURCE_MASK: u32 = 0x0000_00ff;
pub const GALE_TRANSITION_QUALIFIER_MASK: u32 = 0xffff_ff00;

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

/// Allocate a C string for the caller, stripping interior NULs rather than
/// failing.
pub(crate) fn to_c_string(s: impl Into<String>) -> *mut c_char {
    let owned = match CString::new(s.into()) {
        Ok(c) => c,
        Err(err) => {
            let mut bytes = err.into_vec();
            bytes.retain(|&b| b != 0);
            CString::new(bytes).unwrap_or_default()
        }
    };
    owned.into_raw()
}

/// Read a caller C string; null reads as empty.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string valid for the
/// duration of the call.
pub(crate) unsafe fn read_c_str(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

/// Read a caller array of header inputs into a map, preserving order.
///
/// # Safety
/// `items` must be null or point to `len` valid `GaleHeaderInput` values,
/// each with fields satisfying the `read_c_str` contract.
pub(crate) unsafe fn read_header_inputs(
    items: *const GaleHeaderInput,
    len: usize,
) -> HeaderMap {
    if items.is_null() || len == 0 {
        return HeaderMap::new();
    }
    unsafe { std::slice::from_raw_parts(items, len) }
        .iter()
        .map(|input| unsafe { (read_c_str(input.name), read_c_str(input.value)) })
        .collect()
}

impl GaleHeaderList {
    /// Convert a header map into a heap-allocated list the caller owns.
    pub(crate) fn from_map(map: &HeaderMap) -> *mut Self {
        let len = map.len();
        let items = if len == 0 {
            std::ptr::null_mut()
        } else {
            let mut items: Vec<GaleHeader> = map
                .iter()
                .map(|entry| GaleHeader {
                    name: to_c_string(entry.name.clone()),
                    value: to_c_string(entry.value.clone()),
                })
                .collect();
            let ptr = items.as_mut_ptr();
            std::mem::forget(items);
            ptr
        };
        Box::into_raw(Box::new(GaleHeaderList { items, len }))
    }
}

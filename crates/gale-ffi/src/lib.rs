//! C-ABI boundary over `gale-core`.
//!
//! # Overview
//! Exposes the request descriptor registry through `extern "C"` functions so
//! a managed caller can read and mutate natively-owned requests without
//! linking Rust directly. The interop header `include/gale.h` is generated
//! by cbindgen.
//!
//! # Design
//! - One process-global registry; handles cross the boundary as `u64` and 0
//!   always means null/absent, never a live object.
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the boundary.
//! - Mutators return void and silently ignore read-only descriptors, the
//!   contract embedders already rely on; `gale_request_is_read_only` is the
//!   way to check first. Rejections are still visible to `log` subscribers.
//! - Getters return freshly allocated strings and lists; the caller owns
//!   them and releases them with the matching `gale_*_free` function.

pub mod types;

use std::ffi::CString;
use std::os::raw::c_char;
use std::panic::catch_unwind;
use std::sync::OnceLock;

use gale_core::{
    Error, PostDataElement, PostDataHandle, ReferrerPolicy, RequestFlags, RequestHandle,
    RequestRegistry,
};
use log::{trace, warn};

use types::*;

static REGISTRY: OnceLock<RequestRegistry> = OnceLock::new();

fn registry() -> &'static RequestRegistry {
    REGISTRY.get_or_init(RequestRegistry::new)
}

fn request_handle(op: &str, raw: u64) -> Option<RequestHandle> {
    let handle = RequestHandle::from_raw(raw);
    if handle.is_none() {
        warn!("{op}: {raw:#018x} is not a request handle");
    }
    handle
}

fn post_data_handle(op: &str, raw: u64) -> Option<PostDataHandle> {
    let handle = PostDataHandle::from_raw(raw);
    if handle.is_none() {
        warn!("{op}: {raw:#018x} is not a post data handle");
    }
    handle
}

/// Log the outcome of a void mutator. Read-only rejections are part of the
/// boundary contract and stay below warn level.
fn finish_mutation(op: &str, result: gale_core::Result<()>) {
    match result {
        Ok(()) => {}
        Err(Error::ReadOnly) => trace!("{op}: ignored, descriptor is read-only"),
        Err(err) => warn!("{op}: {err}"),
    }
}

// ---------------------------------------------------------------------------
// Request lifecycle
// ---------------------------------------------------------------------------

/// Register a new, empty, mutable request and return its handle.
///
/// Returns 0 if the registry cannot grow or an internal panic occurs.
#[unsafe(no_mangle)]
pub extern "C" fn gale_request_create() -> u64 {
    catch_unwind(|| match registry().create() {
        Ok(handle) => handle.to_raw(),
        Err(err) => {
            warn!("gale_request_create: {err}");
            0
        }
    })
    .unwrap_or(0)
}

/// Retire a request handle. Safe to call with 0 or an already retired handle.
#[unsafe(no_mangle)]
pub extern "C" fn gale_request_dispose(request: u64) {
    let _ = catch_unwind(|| {
        let Some(handle) = request_handle("gale_request_dispose", request) else {
            return;
        };
        if let Err(err) = registry().dispose(handle) {
            warn!("gale_request_dispose: {err}");
        }
    });
}

// ---------------------------------------------------------------------------
// Scalar accessors
// ---------------------------------------------------------------------------

/// Registry-assigned identifier of the request; 0 for an invalid handle.
#[unsafe(no_mangle)]
pub extern "C" fn gale_request_identifier(request: u64) -> u64 {
    catch_unwind(|| {
        let Some(handle) = request_handle("gale_request_identifier", request) else {
            return 0;
        };
        registry().identifier(handle).unwrap_or_else(|err| {
            warn!("gale_request_identifier: {err}");
            0
        })
    })
    .unwrap_or(0)
}

/// Whether the request rejects mutation; false for an invalid handle.
#[unsafe(no_mangle)]
pub extern "C" fn gale_request_is_read_only(request: u64) -> bool {
    catch_unwind(|| {
        let Some(handle) = request_handle("gale_request_is_read_only", request) else {
            return false;
        };
        registry().is_read_only(handle).unwrap_or_else(|err| {
            warn!("gale_request_is_read_only: {err}");
            false
        })
    })
    .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// URL and method
// ---------------------------------------------------------------------------

/// Request URL as a fresh C string; null for an invalid handle.
/// Release with `gale_string_free`.
#[unsafe(no_mangle)]
pub extern "C" fn gale_request_url(request: u64) -> *mut c_char {
    catch_unwind(|| {
        let Some(handle) = request_handle("gale_request_url", request) else {
            return std::ptr::null_mut();
        };
        match registry().url(handle) {
            Ok(url) => to_c_string(url),
            Err(err) => {
                warn!("gale_request_url: {err}");
                std::ptr::null_mut()
            }
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Set the request URL. Ignored on a read-only descriptor.
#[unsafe(no_mangle)]
pub extern "C" fn gale_request_set_url(request: u64, url: *const c_char) {
    let _ = catch_unwind(|| {
        let Some(handle) = request_handle("gale_request_set_url", request) else {
            return;
        };
        let url = unsafe { read_c_str(url) };
        finish_mutation("gale_request_set_url", registry().set_url(handle, url));
    });
}

/// HTTP method token as a fresh C string; null for an invalid handle.
/// Release with `gale_string_free`.
#[unsafe(no_mangle)]
pub extern "C" fn gale_request_method(request: u64) -> *mut c_char {
    catch_unwind(|| {
        let Some(handle) = request_handle("gale_request_method", request) else {
            return std::ptr::null_mut();
        };
        match registry().method(handle) {
            Ok(method) => to_c_string(method),
            Err(err) => {
                warn!("gale_request_method: {err}");
                std::ptr::null_mut()
            }
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Set the HTTP method token. Ignored on a read-only descriptor.
#[unsafe(no_mangle)]
pub extern "C" fn gale_request_set_method(request: u64, method: *const c_char) {
    let _ = catch_unwind(|| {
        let Some(handle) = request_handle("gale_request_set_method", request) else {
            return;
        };
        let method = unsafe { read_c_str(method) };
        finish_mutation(
            "gale_request_set_method",
            registry().set_method(handle, method),
        );
    });
}

// ---------------------------------------------------------------------------
// Referrer
// ---------------------------------------------------------------------------

/// Set the referrer URL and policy together.
///
/// `policy` must be one of the `GALE_REFERRER_POLICY_*` codes; any other
/// value is rejected without touching the request. Ignored on a read-only
/// descriptor.
#[unsafe(no_mangle)]
pub extern "C" fn gale_request_set_referrer(request: u64, url: *const c_char, policy: u32) {
    let _ = catch_unwind(|| {
        let Some(handle) = request_handle("gale_request_set_referrer", request) else {
            return;
        };
        let Some(policy) = ReferrerPolicy::from_raw(policy) else {
            warn!(
                "gale_request_set_referrer: {}",
                Error::InvalidReferrerPolicy(policy)
            );
            return;
        };
        let url = unsafe { read_c_str(url) };
        finish_mutation(
            "gale_request_set_referrer",
            registry().set_referrer(handle, url, policy),
        );
    });
}

/// Referrer URL as a fresh C string; null for an invalid handle.
/// Release with `gale_string_free`.
#[unsafe(no_mangle)]
pub extern "C" fn gale_request_referrer_url(request: u64) -> *mut c_char {
    catch_unwind(|| {
        let Some(handle) = request_handle("gale_request_referrer_url", request) else {
            return std::ptr::null_mut();
        };
        match registry().referrer_url(handle) {
            Ok(url) => to_c_string(url),
            Err(err) => {
                warn!("gale_request_referrer_url: {err}");
                std::ptr::null_mut()
            }
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Referrer policy as a `GALE_REFERRER_POLICY_*` code; 0 for an invalid
/// handle.
#[unsafe(no_mangle)]
pub extern "C" fn gale_request_referrer_policy(request: u64) -> u32 {
    catch_unwind(|| {
        let Some(handle) = request_handle("gale_request_referrer_policy", request) else {
            return 0;
        };
        match registry().referrer_policy(handle) {
            Ok(policy) => policy.as_raw(),
            Err(err) => {
                warn!("gale_request_referrer_policy: {err}");
                0
            }
        }
    })
    .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Post data attachment
// ---------------------------------------------------------------------------

/// Handle to the request's body, or 0 when it has none.
///
/// Each call grants a fresh handle to the same shared body; release each
/// grant with `gale_post_data_dispose`. Mutations through any live handle
/// are visible through all of them and through the request.
#[unsafe(no_mangle)]
pub extern "C" fn gale_request_post_data(request: u64) -> u64 {
    catch_unwind(|| {
        let Some(handle) = request_handle("gale_request_post_data", request) else {
            return 0;
        };
        match registry().post_data(handle) {
            Ok(Some(body)) => body.to_raw(),
            Ok(None) => 0,
            Err(err) => {
                warn!("gale_request_post_data: {err}");
                0
            }
        }
    })
    .unwrap_or(0)
}

/// Attach a registered body to the request; pass 0 to detach. Ignored on a
/// read-only descriptor.
#[unsafe(no_mangle)]
pub extern "C" fn gale_request_set_post_data(request: u64, post_data: u64) {
    let _ = catch_unwind(|| {
        let Some(handle) = request_handle("gale_request_set_post_data", request) else {
            return;
        };
        let body = if post_data == 0 {
            None
        } else {
            match post_data_handle("gale_request_set_post_data", post_data) {
                Some(body) => Some(body),
                None => return,
            }
        };
        finish_mutation(
            "gale_request_set_post_data",
            registry().set_post_data(handle, body),
        );
    });
}

// ---------------------------------------------------------------------------
// Headers
// ---------------------------------------------------------------------------

/// First value for a header name, compared case-insensitively.
///
/// Null when the name is absent or the handle is invalid; a present empty
/// value returns a non-null empty string. Release with `gale_string_free`.
#[unsafe(no_mangle)]
pub extern "C" fn gale_request_header_by_name(
    request: u64,
    name: *const c_char,
) -> *mut c_char {
    catch_unwind(|| {
        let Some(handle) = request_handle("gale_request_header_by_name", request) else {
            return std::ptr::null_mut();
        };
        let name = unsafe { read_c_str(name) };
        match registry().header(handle, &name) {
            Ok(Some(value)) => to_c_string(value),
            Ok(None) => std::ptr::null_mut(),
            Err(err) => {
                warn!("gale_request_header_by_name: {err}");
                std::ptr::null_mut()
            }
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Set one header.
///
/// With `overwrite` true every existing value for the name is replaced by
/// the single given value; with `overwrite` false the value is appended and
/// existing ones survive. Ignored on a read-only descriptor.
#[unsafe(no_mangle)]
pub extern "C" fn gale_request_set_header_by_name(
    request: u64,
    name: *const c_char,
    value: *const c_char,
    overwrite: bool,
) {
    let _ = catch_unwind(|| {
        let Some(handle) = request_handle("gale_request_set_header_by_name", request) else {
            return;
        };
        let name = unsafe { read_c_str(name) };
        let value = unsafe { read_c_str(value) };
        finish_mutation(
            "gale_request_set_header_by_name",
            registry().set_header(handle, name, value, overwrite),
        );
    });
}

/// Full header set in insertion order; null for an invalid handle.
/// Release with `gale_header_list_free`.
#[unsafe(no_mangle)]
pub extern "C" fn gale_request_header_map(request: u64) -> *mut GaleHeaderList {
    catch_unwind(|| {
        let Some(handle) = request_handle("gale_request_header_map", request) else {
            return std::ptr::null_mut();
        };
        match registry().header_map(handle) {
            Ok(map) => GaleHeaderList::from_map(&map),
            Err(err) => {
                warn!("gale_request_header_map: {err}");
                std::ptr::null_mut()
            }
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Replace the entire header set with `len` entries from `items`.
/// Ignored on a read-only descriptor.
#[unsafe(no_mangle)]
pub extern "C" fn gale_request_set_header_map(
    request: u64,
    items: *const GaleHeaderInput,
    len: usize,
) {
    let _ = catch_unwind(|| {
        let Some(handle) = request_handle("gale_request_set_header_map", request) else {
            return;
        };
        let headers = unsafe { read_header_inputs(items, len) };
        finish_mutation(
            "gale_request_set_header_map",
            registry().set_header_map(handle, headers),
        );
    });
}

// ---------------------------------------------------------------------------
// Bulk update
// ---------------------------------------------------------------------------

/// Replace URL, method, body, and header set in one atomic operation.
///
/// `post_data` 0 means no body. A stale body handle fails the whole call;
/// there is no partial application. Ignored on a read-only descriptor.
#[unsafe(no_mangle)]
pub extern "C" fn gale_request_set(
    request: u64,
    url: *const c_char,
    method: *const c_char,
    post_data: u64,
    items: *const GaleHeaderInput,
    len: usize,
) {
    let _ = catch_unwind(|| {
        let Some(handle) = request_handle("gale_request_set", request) else {
            return;
        };
        let body = if post_data == 0 {
            None
        } else {
            match post_data_handle("gale_request_set", post_data) {
                Some(body) => Some(body),
                None => return,
            }
        };
        let url = unsafe { read_c_str(url) };
        let method = unsafe { read_c_str(method) };
        let headers = unsafe { read_header_inputs(items, len) };
        finish_mutation(
            "gale_request_set",
            registry().set_all(handle, url, method, body, headers),
        );
    });
}

// ---------------------------------------------------------------------------
// Flags and classification
// ---------------------------------------------------------------------------

/// Request flags as a `GALE_REQUEST_FLAG_*` bitmask; 0 for an invalid
/// handle. Engine-private bits round-trip unchanged.
#[unsafe(no_mangle)]
pub extern "C" fn gale_request_flags(request: u64) -> u32 {
    catch_unwind(|| {
        let Some(handle) = request_handle("gale_request_flags", request) else {
            return 0;
        };
        match registry().flags(handle) {
            Ok(flags) => flags.bits(),
            Err(err) => {
                warn!("gale_request_flags: {err}");
                0
            }
        }
    })
    .unwrap_or(0)
}

/// Replace the request flags bitmask. Ignored on a read-only descriptor.
#[unsafe(no_mangle)]
pub extern "C" fn gale_request_set_flags(request: u64, flags: u32) {
    let _ = catch_unwind(|| {
        let Some(handle) = request_handle("gale_request_set_flags", request) else {
            return;
        };
        finish_mutation(
            "gale_request_set_flags",
            registry().set_flags(handle, RequestFlags::from_bits_retain(flags)),
        );
    });
}

/// URL used for cookie same-site evaluation; null for an invalid handle.
/// Release with `gale_string_free`.
#[unsafe(no_mangle)]
pub extern "C" fn gale_request_first_party_for_cookies(request: u64) -> *mut c_char {
    catch_unwind(|| {
        let Some(handle) = request_handle("gale_request_first_party_for_cookies", request)
        else {
            return std::ptr::null_mut();
        };
        match registry().first_party_for_cookies(handle) {
            Ok(url) => to_c_string(url),
            Err(err) => {
                warn!("gale_request_first_party_for_cookies: {err}");
                std::ptr::null_mut()
            }
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Set the URL used for cookie same-site evaluation. Ignored on a read-only
/// descriptor.
#[unsafe(no_mangle)]
pub extern "C" fn gale_request_set_first_party_for_cookies(request: u64, url: *const c_char) {
    let _ = catch_unwind(|| {
        let Some(handle) = request_handle("gale_request_set_first_party_for_cookies", request)
        else {
            return;
        };
        let url = unsafe { read_c_str(url) };
        finish_mutation(
            "gale_request_set_first_party_for_cookies",
            registry().set_first_party_for_cookies(handle, url),
        );
    });
}

/// Engine-assigned resource classification as a `GALE_RESOURCE_TYPE_*`
/// code; 0 for an invalid handle. There is no setter.
#[unsafe(no_mangle)]
pub extern "C" fn gale_request_resource_type(request: u64) -> u32 {
    catch_unwind(|| {
        let Some(handle) = request_handle("gale_request_resource_type", request) else {
            return 0;
        };
        match registry().resource_type(handle) {
            Ok(resource_type) => resource_type.as_raw(),
            Err(err) => {
                warn!("gale_request_resource_type: {err}");
                0
            }
        }
    })
    .unwrap_or(0)
}

/// Engine-assigned navigation transition: a `GALE_TRANSITION_SOURCE_*` code
/// in the low byte plus `GALE_TRANSITION_QUALIFIER_*` bits; 0 for an
/// invalid handle. There is no setter.
#[unsafe(no_mangle)]
pub extern "C" fn gale_request_transition_type(request: u64) -> u32 {
    catch_unwind(|| {
        let Some(handle) = request_handle("gale_request_transition_type", request) else {
            return 0;
        };
        match registry().transition_type(handle) {
            Ok(transition) => transition.as_raw(),
            Err(err) => {
                warn!("gale_request_transition_type: {err}");
                0
            }
        }
    })
    .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Post data
// ---------------------------------------------------------------------------

/// Register a new, empty, mutable body and return its handle.
///
/// Returns 0 if the registry cannot grow or an internal panic occurs.
#[unsafe(no_mangle)]
pub extern "C" fn gale_post_data_create() -> u64 {
    catch_unwind(|| match registry().create_post_data() {
        Ok(handle) => handle.to_raw(),
        Err(err) => {
            warn!("gale_post_data_create: {err}");
            0
        }
    })
    .unwrap_or(0)
}

/// Retire a body handle. A request still referencing the body keeps it
/// alive and attached. Safe to call with 0 or an already retired handle.
#[unsafe(no_mangle)]
pub extern "C" fn gale_post_data_dispose(post_data: u64) {
    let _ = catch_unwind(|| {
        let Some(handle) = post_data_handle("gale_post_data_dispose", post_data) else {
            return;
        };
        if let Err(err) = registry().dispose_post_data(handle) {
            warn!("gale_post_data_dispose: {err}");
        }
    });
}

/// Whether the body rejects mutation; false for an invalid handle.
#[unsafe(no_mangle)]
pub extern "C" fn gale_post_data_is_read_only(post_data: u64) -> bool {
    catch_unwind(|| {
        let Some(handle) = post_data_handle("gale_post_data_is_read_only", post_data) else {
            return false;
        };
        registry()
            .post_data_is_read_only(handle)
            .unwrap_or_else(|err| {
                warn!("gale_post_data_is_read_only: {err}");
                false
            })
    })
    .unwrap_or(false)
}

/// Number of elements in the body; 0 for an invalid handle.
#[unsafe(no_mangle)]
pub extern "C" fn gale_post_data_element_count(post_data: u64) -> usize {
    catch_unwind(|| {
        let Some(handle) = post_data_handle("gale_post_data_element_count", post_data) else {
            return 0;
        };
        registry()
            .post_data_element_count(handle)
            .unwrap_or_else(|err| {
                warn!("gale_post_data_element_count: {err}");
                0
            })
    })
    .unwrap_or(0)
}

/// Append a bytes element copied out of `data`.
///
/// Returns false on a read-only body or an invalid handle; the caller's
/// buffer is only read for the duration of the call.
#[unsafe(no_mangle)]
pub extern "C" fn gale_post_data_add_bytes(
    post_data: u64,
    data: *const u8,
    len: usize,
) -> bool {
    catch_unwind(|| {
        let Some(handle) = post_data_handle("gale_post_data_add_bytes", post_data) else {
            return false;
        };
        let bytes = if data.is_null() || len == 0 {
            bytes::Bytes::new()
        } else {
            bytes::Bytes::copy_from_slice(unsafe { std::slice::from_raw_parts(data, len) })
        };
        match registry().post_data_add_element(handle, PostDataElement::Bytes(bytes)) {
            Ok(()) => true,
            Err(Error::ReadOnly) => {
                trace!("gale_post_data_add_bytes: rejected, body is read-only");
                false
            }
            Err(err) => {
                warn!("gale_post_data_add_bytes: {err}");
                false
            }
        }
    })
    .unwrap_or(false)
}

/// Append a file-reference element with the given path.
///
/// Returns false on a read-only body or an invalid handle.
#[unsafe(no_mangle)]
pub extern "C" fn gale_post_data_add_file(post_data: u64, path: *const c_char) -> bool {
    catch_unwind(|| {
        let Some(handle) = post_data_handle("gale_post_data_add_file", post_data) else {
            return false;
        };
        let path = unsafe { read_c_str(path) };
        match registry().post_data_add_element(handle, PostDataElement::File(path)) {
            Ok(()) => true,
            Err(Error::ReadOnly) => {
                trace!("gale_post_data_add_file: rejected, body is read-only");
                false
            }
            Err(err) => {
                warn!("gale_post_data_add_file: {err}");
                false
            }
        }
    })
    .unwrap_or(false)
}

/// Remove every element from the body. Ignored on a read-only body.
#[unsafe(no_mangle)]
pub extern "C" fn gale_post_data_remove_elements(post_data: u64) {
    let _ = catch_unwind(|| {
        let Some(handle) = post_data_handle("gale_post_data_remove_elements", post_data) else {
            return;
        };
        finish_mutation(
            "gale_post_data_remove_elements",
            registry().post_data_remove_elements(handle),
        );
    });
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free a C string returned by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn gale_string_free(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { CString::from_raw(s) });
        });
    }
}

/// Free a header list returned by `gale_request_header_map`. Safe to call
/// with null.
#[unsafe(no_mangle)]
pub extern "C" fn gale_header_list_free(list: *mut GaleHeaderList) {
    if list.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let list = unsafe { Box::from_raw(list) };
        if !list.items.is_null() && list.len > 0 {
            let items = unsafe { Vec::from_raw_parts(list.items, list.len, list.len) };
            for item in items {
                if !item.name.is_null() {
                    drop(unsafe { CString::from_raw(item.name) });
                }
                if !item.value.is_null() {
                    drop(unsafe { CString::from_raw(item.value) });
                }
            }
        }
    });
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

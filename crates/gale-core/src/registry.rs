//! Handle registry
//!
//! [`RequestRegistry`] owns every descriptor and body reachable from the
//! boundary and maps handles to them. Slots live in generational arenas:
//! disposing bumps the slot generation, so a retained handle turns into
//! [`Error::StaleHandle`] instead of silently reaching a recycled object.
//!
//! Concurrency model: the arenas sit behind `RwLock`s that are held only
//! long enough to clone the slot's `Arc` out, and each descriptor or body
//! has its own `Mutex` held for the duration of one operation. A compound
//! mutator (referrer pair, `set_all`) therefore runs under a single lock
//! and no reader can observe it half-applied. The only nested acquisition
//! is request then attached body, inside [`freeze`].
//!
//! [`freeze`]: RequestRegistry::freeze

use std::marker::PhantomData;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;
use parking_lot::{Mutex, RwLock};

use crate::classify::{ResourceType, TransitionType};
use crate::handle::{Handle, PostDataHandle, PostDataTag, RequestHandle, RequestTag};
use crate::header::HeaderMap;
use crate::post_data::{PostData, PostDataElement, SharedPostData};
use crate::request::{ReferrerPolicy, RequestDescriptor, RequestFlags};
use crate::{Error, Result};

struct Slot<T> {
    generation: NonZeroU32,
    value: Option<T>,
}

/// Generational slot arena; slot indices recycle, generations do not match
/// across a recycle
struct Arena<T, Tag> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    _marker: PhantomData<fn() -> Tag>,
}

impl<T, Tag> Default for Arena<T, Tag> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            _marker: PhantomData,
        }
    }
}

impl<T, Tag> Arena<T, Tag> {
    fn insert(&mut self, value: T) -> Result<Handle<Tag>> {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return Ok(Handle::new(index, slot.generation));
        }
        let index = u32::try_from(self.slots.len()).map_err(|_| Error::RegistryFull)?;
        self.slots.push(Slot {
            generation: NonZeroU32::MIN,
            value: Some(value),
        });
        Ok(Handle::new(index, NonZeroU32::MIN))
    }

    fn get(&self, handle: Handle<Tag>) -> Option<&T> {
        self.slots
            .get(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.value.as_ref())
    }

    fn remove(&mut self, handle: Handle<Tag>) -> Option<T> {
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if slot.generation != handle.generation() || slot.value.is_none() {
            return None;
        }
        let value = slot.value.take();
        // Wraps past u32::MAX back to 1, skipping the reserved 0.
        slot.generation =
            NonZeroU32::new(slot.generation.get().wrapping_add(1)).unwrap_or(NonZeroU32::MIN);
        self.free.push(handle.index());
        value
    }

    fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

/// Process-wide owner of boundary-visible requests and bodies
pub struct RequestRegistry {
    requests: RwLock<Arena<Arc<Mutex<RequestDescriptor>>, RequestTag>>,
    bodies: RwLock<Arena<SharedPostData, PostDataTag>>,
    next_identifier: AtomicU64,
}

impl Default for RequestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestRegistry {
    /// Create an empty registry; identifiers start at 1, 0 stays reserved
    pub fn new() -> Self {
        Self {
            requests: RwLock::new(Arena::default()),
            bodies: RwLock::new(Arena::default()),
            next_identifier: AtomicU64::new(1),
        }
    }

    fn next_identifier(&self) -> u64 {
        self.next_identifier.fetch_add(1, Ordering::Relaxed)
    }

    fn request_arc(&self, handle: RequestHandle) -> Result<Arc<Mutex<RequestDescriptor>>> {
        self.requests
            .read()
            .get(handle)
            .cloned()
            .ok_or(Error::StaleHandle {
                handle: handle.to_raw(),
            })
    }

    fn body_arc(&self, handle: PostDataHandle) -> Result<SharedPostData> {
        self.bodies
            .read()
            .get(handle)
            .cloned()
            .ok_or(Error::StaleHandle {
                handle: handle.to_raw(),
            })
    }

    fn with_request<R>(
        &self,
        handle: RequestHandle,
        f: impl FnOnce(&mut RequestDescriptor) -> Result<R>,
    ) -> Result<R> {
        let descriptor = self.request_arc(handle)?;
        let mut guard = descriptor.lock();
        f(&mut guard)
    }

    // ---- request lifecycle ----

    /// Register a new, empty, mutable descriptor and grant a handle to it
    pub fn create(&self) -> Result<RequestHandle> {
        let mut descriptor = RequestDescriptor::new();
        let identifier = self.next_identifier();
        descriptor.assign_identifier(identifier);
        let handle = self
            .requests
            .write()
            .insert(Arc::new(Mutex::new(descriptor)))?;
        debug!("request created: identifier={identifier} handle={:#018x}", handle.to_raw());
        Ok(handle)
    }

    /// Register an already-built descriptor, assigning it a fresh identifier
    pub fn adopt(&self, mut descriptor: RequestDescriptor) -> Result<RequestHandle> {
        let identifier = self.next_identifier();
        descriptor.assign_identifier(identifier);
        let handle = self
            .requests
            .write()
            .insert(Arc::new(Mutex::new(descriptor)))?;
        debug!("request adopted: identifier={identifier} handle={:#018x}", handle.to_raw());
        Ok(handle)
    }

    /// Retire a handle; later calls with it fail with [`Error::StaleHandle`]
    pub fn dispose(&self, handle: RequestHandle) -> Result<()> {
        let descriptor = self
            .requests
            .write()
            .remove(handle)
            .ok_or(Error::StaleHandle {
                handle: handle.to_raw(),
            })?;
        debug!("request disposed: identifier={}", descriptor.lock().identifier());
        Ok(())
    }

    /// Run a closure against the live descriptor behind a handle
    ///
    /// The descriptor stays locked for the whole closure, so every field the
    /// closure reads comes from one consistent state.
    pub fn inspect<R>(
        &self,
        handle: RequestHandle,
        f: impl FnOnce(&RequestDescriptor) -> R,
    ) -> Result<R> {
        let descriptor = self.request_arc(handle)?;
        let guard = descriptor.lock();
        Ok(f(&guard))
    }

    /// One-way transition of the descriptor (and any attached body) to
    /// read-only
    pub fn freeze(&self, handle: RequestHandle) -> Result<()> {
        let descriptor = self.request_arc(handle)?;
        descriptor.lock().freeze();
        Ok(())
    }

    // ---- request accessors ----

    /// Registry-assigned identifier, stable for the registration's lifetime
    pub fn identifier(&self, handle: RequestHandle) -> Result<u64> {
        self.inspect(handle, |req| req.identifier())
    }

    /// Whether the descriptor rejects mutation
    pub fn is_read_only(&self, handle: RequestHandle) -> Result<bool> {
        self.inspect(handle, |req| req.is_read_only())
    }

    pub fn url(&self, handle: RequestHandle) -> Result<String> {
        self.inspect(handle, |req| req.url().to_string())
    }

    pub fn set_url(&self, handle: RequestHandle, url: impl Into<String>) -> Result<()> {
        self.with_request(handle, |req| req.set_url(url))
    }

    pub fn method(&self, handle: RequestHandle) -> Result<String> {
        self.inspect(handle, |req| req.method().to_string())
    }

    pub fn set_method(&self, handle: RequestHandle, method: impl Into<String>) -> Result<()> {
        self.with_request(handle, |req| req.set_method(method))
    }

    pub fn referrer_url(&self, handle: RequestHandle) -> Result<String> {
        self.inspect(handle, |req| req.referrer_url().to_string())
    }

    pub fn referrer_policy(&self, handle: RequestHandle) -> Result<ReferrerPolicy> {
        self.inspect(handle, |req| req.referrer_policy())
    }

    /// Update the referrer URL and policy as one atomic pair
    pub fn set_referrer(
        &self,
        handle: RequestHandle,
        url: impl Into<String>,
        policy: ReferrerPolicy,
    ) -> Result<()> {
        self.with_request(handle, |req| req.set_referrer(url, policy))
    }

    /// First value for a header name; `None` when the name is absent
    pub fn header(&self, handle: RequestHandle, name: &str) -> Result<Option<String>> {
        self.inspect(handle, |req| req.header(name).map(str::to_string))
    }

    /// Set one header, either overwriting all values for the name or
    /// appending to them
    pub fn set_header(
        &self,
        handle: RequestHandle,
        name: impl Into<String>,
        value: impl Into<String>,
        overwrite: bool,
    ) -> Result<()> {
        self.with_request(handle, |req| req.set_header(name, value, overwrite))
    }

    /// Copy of the full header set, in insertion order
    pub fn header_map(&self, handle: RequestHandle) -> Result<HeaderMap> {
        self.inspect(handle, |req| req.headers().clone())
    }

    /// Append every header to a caller-held map without clearing it first
    pub fn header_map_into(&self, handle: RequestHandle, out: &mut HeaderMap) -> Result<()> {
        let descriptor = self.request_arc(handle)?;
        let guard = descriptor.lock();
        guard.headers().extend_into(out);
        Ok(())
    }

    /// Replace the entire header set
    pub fn set_header_map(&self, handle: RequestHandle, headers: HeaderMap) -> Result<()> {
        self.with_request(handle, |req| req.set_headers(headers))
    }

    /// Replace URL, method, body, and headers in one atomic operation
    ///
    /// A stale body handle fails the whole call before any request state is
    /// touched.
    pub fn set_all(
        &self,
        handle: RequestHandle,
        url: impl Into<String>,
        method: impl Into<String>,
        post_data: Option<PostDataHandle>,
        headers: HeaderMap,
    ) -> Result<()> {
        let body = post_data.map(|h| self.body_arc(h)).transpose()?;
        self.with_request(handle, |req| req.set_all(url, method, body, headers))
    }

    pub fn flags(&self, handle: RequestHandle) -> Result<RequestFlags> {
        self.inspect(handle, |req| req.flags())
    }

    pub fn set_flags(&self, handle: RequestHandle, flags: RequestFlags) -> Result<()> {
        self.with_request(handle, |req| req.set_flags(flags))
    }

    pub fn first_party_for_cookies(&self, handle: RequestHandle) -> Result<String> {
        self.inspect(handle, |req| req.first_party_for_cookies().to_string())
    }

    pub fn set_first_party_for_cookies(
        &self,
        handle: RequestHandle,
        url: impl Into<String>,
    ) -> Result<()> {
        self.with_request(handle, |req| req.set_first_party_for_cookies(url))
    }

    /// Engine-assigned resource classification
    pub fn resource_type(&self, handle: RequestHandle) -> Result<ResourceType> {
        self.inspect(handle, |req| req.resource_type())
    }

    /// Engine-assigned navigation transition
    pub fn transition_type(&self, handle: RequestHandle) -> Result<TransitionType> {
        self.inspect(handle, |req| req.transition_type())
    }

    // ---- body attachment ----

    /// Grant a handle to the request's attached body, or `None` when it has
    /// no body
    ///
    /// Every call grants a fresh handle to the same shared body; each one is
    /// retired independently with [`dispose_post_data`]. Mutating through any
    /// live handle is visible through all of them and through the request.
    ///
    /// [`dispose_post_data`]: Self::dispose_post_data
    pub fn post_data(&self, handle: RequestHandle) -> Result<Option<PostDataHandle>> {
        let body = {
            let descriptor = self.request_arc(handle)?;
            let guard = descriptor.lock();
            guard.post_data().cloned()
        };
        match body {
            Some(body) => Ok(Some(self.bodies.write().insert(body)?)),
            None => Ok(None),
        }
    }

    /// Attach a registered body to the request, or detach with `None`
    ///
    /// The request holds its own reference; retiring the body handle later
    /// does not detach it.
    pub fn set_post_data(
        &self,
        handle: RequestHandle,
        post_data: Option<PostDataHandle>,
    ) -> Result<()> {
        let body = post_data.map(|h| self.body_arc(h)).transpose()?;
        self.with_request(handle, |req| req.set_post_data(body))
    }

    // ---- body lifecycle and accessors ----

    /// Register a new, empty, mutable body and grant a handle to it
    pub fn create_post_data(&self) -> Result<PostDataHandle> {
        self.adopt_post_data(PostData::new())
    }

    /// Register an already-built body
    pub fn adopt_post_data(&self, post_data: PostData) -> Result<PostDataHandle> {
        let handle = self
            .bodies
            .write()
            .insert(Arc::new(Mutex::new(post_data)))?;
        debug!("post data registered: handle={:#018x}", handle.to_raw());
        Ok(handle)
    }

    /// Retire a body handle
    ///
    /// Only the handle dies; a request still referencing the body keeps it
    /// alive and attached.
    pub fn dispose_post_data(&self, handle: PostDataHandle) -> Result<()> {
        self.bodies
            .write()
            .remove(handle)
            .map(|_| ())
            .ok_or(Error::StaleHandle {
                handle: handle.to_raw(),
            })
    }

    pub fn post_data_is_read_only(&self, handle: PostDataHandle) -> Result<bool> {
        Ok(self.body_arc(handle)?.lock().is_read_only())
    }

    pub fn post_data_element_count(&self, handle: PostDataHandle) -> Result<usize> {
        Ok(self.body_arc(handle)?.lock().element_count())
    }

    /// Copy of the body's elements, in order
    pub fn post_data_elements(&self, handle: PostDataHandle) -> Result<Vec<PostDataElement>> {
        Ok(self.body_arc(handle)?.lock().elements().to_vec())
    }

    /// Append one element to the body
    pub fn post_data_add_element(
        &self,
        handle: PostDataHandle,
        element: PostDataElement,
    ) -> Result<()> {
        self.body_arc(handle)?.lock().add_element(element)
    }

    /// Remove every element from the body
    pub fn post_data_remove_elements(&self, handle: PostDataHandle) -> Result<()> {
        self.body_arc(handle)?.lock().remove_elements()
    }

    // ---- introspection ----

    /// Number of live request registrations
    pub fn live_requests(&self) -> usize {
        self.requests.read().len()
    }

    /// Number of live body handles
    pub fn live_bodies(&self) -> usize {
        self.bodies.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestBuilder;
    use bytes::Bytes;

    #[test]
    fn test_create_and_dispose() {
        let registry = RequestRegistry::new();
        let handle = registry.create().unwrap();
        assert_eq!(registry.live_requests(), 1);
        assert_eq!(registry.method(handle).unwrap(), "GET");

        registry.dispose(handle).unwrap();
        assert_eq!(registry.live_requests(), 0);
        assert_eq!(
            registry.url(handle),
            Err(Error::StaleHandle {
                handle: handle.to_raw()
            })
        );
    }

    #[test]
    fn test_dispose_twice_fails() {
        let registry = RequestRegistry::new();
        let handle = registry.create().unwrap();
        registry.dispose(handle).unwrap();
        assert!(matches!(
            registry.dispose(handle),
            Err(Error::StaleHandle { .. })
        ));
    }

    #[test]
    fn test_recycled_slot_rejects_old_handle() {
        let registry = RequestRegistry::new();
        let old = registry.create().unwrap();
        registry.dispose(old).unwrap();

        // Same slot, new generation.
        let new = registry.create().unwrap();
        assert_ne!(old.to_raw(), new.to_raw());
        assert!(registry.url(old).is_err());
        assert!(registry.url(new).is_ok());
    }

    #[test]
    fn test_identifiers_are_unique_and_stable() {
        let registry = RequestRegistry::new();
        let a = registry.create().unwrap();
        let b = registry.create().unwrap();

        let id_a = registry.identifier(a).unwrap();
        let id_b = registry.identifier(b).unwrap();
        assert_ne!(id_a, 0);
        assert_ne!(id_a, id_b);

        registry.set_url(a, "https://example.com/").unwrap();
        assert_eq!(registry.identifier(a).unwrap(), id_a);
    }

    #[test]
    fn test_adopt_assigns_fresh_identifier() {
        let registry = RequestRegistry::new();
        let descriptor = RequestBuilder::new("https://example.com/").build();
        assert_eq!(descriptor.identifier(), 0);

        let handle = registry.adopt(descriptor).unwrap();
        assert_ne!(registry.identifier(handle).unwrap(), 0);
    }

    #[test]
    fn test_read_only_propagates_through_registry() {
        let registry = RequestRegistry::new();
        let descriptor = RequestBuilder::new("https://example.com/")
            .read_only()
            .build();
        let handle = registry.adopt(descriptor).unwrap();

        assert!(registry.is_read_only(handle).unwrap());
        assert_eq!(
            registry.set_url(handle, "https://other/"),
            Err(Error::ReadOnly)
        );
        assert_eq!(registry.url(handle).unwrap(), "https://example.com/");
    }

    #[test]
    fn test_post_data_grants_fresh_handle_per_call() {
        let registry = RequestRegistry::new();
        let request = registry.create().unwrap();
        let body = registry.create_post_data().unwrap();
        registry.set_post_data(request, Some(body)).unwrap();

        let first = registry.post_data(request).unwrap().unwrap();
        let second = registry.post_data(request).unwrap().unwrap();
        assert_ne!(first, second);
        assert_eq!(registry.live_bodies(), 3);

        // Retiring one grant leaves the other and the attachment intact.
        registry.dispose_post_data(first).unwrap();
        assert_eq!(registry.live_bodies(), 2);
        assert!(registry.post_data_element_count(first).is_err());
        assert_eq!(registry.post_data_element_count(second).unwrap(), 0);
        assert!(registry.post_data(request).unwrap().is_some());
    }

    #[test]
    fn test_body_mutation_visible_through_request() {
        let registry = RequestRegistry::new();
        let request = registry.create().unwrap();
        let body = registry.create_post_data().unwrap();
        registry.set_post_data(request, Some(body)).unwrap();

        registry
            .post_data_add_element(body, PostDataElement::Bytes(Bytes::from_static(b"a=1")))
            .unwrap();

        let grant = registry.post_data(request).unwrap().unwrap();
        assert_eq!(registry.post_data_element_count(grant).unwrap(), 1);
    }

    #[test]
    fn test_set_post_data_none_detaches() {
        let registry = RequestRegistry::new();
        let request = registry.create().unwrap();
        let body = registry.create_post_data().unwrap();
        registry.set_post_data(request, Some(body)).unwrap();
        assert!(registry.post_data(request).unwrap().is_some());

        registry.set_post_data(request, None).unwrap();
        assert!(registry.post_data(request).unwrap().is_none());
    }

    #[test]
    fn test_set_all_with_stale_body_leaves_request_untouched() {
        let registry = RequestRegistry::new();
        let request = registry.create().unwrap();
        registry.set_url(request, "https://before/").unwrap();

        let body = registry.create_post_data().unwrap();
        registry.dispose_post_data(body).unwrap();

        let result = registry.set_all(
            request,
            "https://after/",
            "POST",
            Some(body),
            HeaderMap::new(),
        );
        assert!(matches!(result, Err(Error::StaleHandle { .. })));
        assert_eq!(registry.url(request).unwrap(), "https://before/");
        assert_eq!(registry.method(request).unwrap(), "GET");
    }

    #[test]
    fn test_freeze_via_registry_freezes_attached_body() {
        let registry = RequestRegistry::new();
        let request = registry.create().unwrap();
        let body = registry.create_post_data().unwrap();
        registry.set_post_data(request, Some(body)).unwrap();

        registry.freeze(request).unwrap();
        assert!(registry.is_read_only(request).unwrap());
        assert!(registry.post_data_is_read_only(body).unwrap());
        assert_eq!(
            registry.post_data_add_element(
                body,
                PostDataElement::Bytes(Bytes::from_static(b"late"))
            ),
            Err(Error::ReadOnly)
        );
    }

    #[test]
    fn test_header_map_into_is_additive() {
        let registry = RequestRegistry::new();
        let request = registry.create().unwrap();
        registry
            .set_header(request, "Accept", "text/html", false)
            .unwrap();

        let mut out: HeaderMap = [("X-Existing", "kept")].into_iter().collect();
        registry.header_map_into(request, &mut out).unwrap();

        assert_eq!(out.get("X-Existing"), Some("kept"));
        assert_eq!(out.get("accept"), Some("text/html"));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_inspect_sees_one_consistent_state() {
        let registry = RequestRegistry::new();
        let request = registry.create().unwrap();
        registry
            .set_referrer(request, "https://ref.example/", ReferrerPolicy::Origin)
            .unwrap();

        let (url, policy) = registry
            .inspect(request, |req| {
                (req.referrer_url().to_string(), req.referrer_policy())
            })
            .unwrap();
        assert_eq!(url, "https://ref.example/");
        assert_eq!(policy, ReferrerPolicy::Origin);
    }
}

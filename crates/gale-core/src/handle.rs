//! Generation-checked handles
//!
//! Boundary callers never hold references into the registry; they hold
//! [`Handle`]s, which pack an arena slot index together with the slot's
//! generation at grant time. Retiring a slot bumps its generation, so a
//! handle kept past [`dispose`] fails the generation check instead of
//! reaching whatever object reused the slot.
//!
//! A handle packs to a non-zero `u64` for the C boundary; 0 is reserved to
//! mean null/absent and never names a live object.
//!
//! [`dispose`]: crate::registry::RequestRegistry::dispose

use std::marker::PhantomData;
use std::num::NonZeroU32;

/// Typed handle to one registry slot
///
/// The type parameter is a compile-time tag only; request and body handles
/// are distinct types even though both pack to `u64` the same way.
pub struct Handle<T> {
    index: u32,
    generation: NonZeroU32,
    _marker: PhantomData<fn() -> T>,
}

/// Tag type for request descriptor handles
pub enum RequestTag {}

/// Tag type for post data handles
pub enum PostDataTag {}

/// Handle to a registered request descriptor
pub type RequestHandle = Handle<RequestTag>;

/// Handle to a registered post data object
pub type PostDataHandle = Handle<PostDataTag>;

impl<T> Handle<T> {
    pub(crate) fn new(index: u32, generation: NonZeroU32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    pub(crate) fn index(&self) -> u32 {
        self.index
    }

    pub(crate) fn generation(&self) -> NonZeroU32 {
        self.generation
    }

    /// Pack into the `u64` wire form: generation in the high 32 bits, slot
    /// index in the low 32. Never 0.
    pub fn to_raw(self) -> u64 {
        (u64::from(self.generation.get()) << 32) | u64::from(self.index)
    }

    /// Unpack a wire value; 0 (and any value with a zero generation half)
    /// is not a handle
    pub fn from_raw(raw: u64) -> Option<Self> {
        let generation = NonZeroU32::new((raw >> 32) as u32)?;
        Some(Self::new(raw as u32, generation))
    }
}

// Manual impls: derives would put bounds on the tag type.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> std::hash::Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("index", &self.index)
            .field("generation", &self.generation.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_round_trip() {
        let handle = RequestHandle::new(42, NonZeroU32::new(7).unwrap());
        let raw = handle.to_raw();
        assert_eq!(raw, (7u64 << 32) | 42);
        assert_eq!(RequestHandle::from_raw(raw), Some(handle));
    }

    #[test]
    fn test_zero_is_never_a_handle() {
        assert_eq!(RequestHandle::from_raw(0), None);
        // Index alone without a generation half is not a handle either.
        assert_eq!(RequestHandle::from_raw(42), None);
    }

    #[test]
    fn test_raw_is_never_zero() {
        let handle = PostDataHandle::new(0, NonZeroU32::new(1).unwrap());
        assert_ne!(handle.to_raw(), 0);
    }

    #[test]
    fn test_same_slot_different_generation_differs() {
        let first = RequestHandle::new(3, NonZeroU32::new(1).unwrap());
        let second = RequestHandle::new(3, NonZeroU32::new(2).unwrap());
        assert_ne!(first, second);
        assert_ne!(first.to_raw(), second.to_raw());
    }
}

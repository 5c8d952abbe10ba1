//! Request body descriptors
//!
//! A post data object is a list of payload elements, either in-memory bytes
//! or a path to a file uploaded at send time. Bodies are shared: a request
//! descriptor and any number of boundary handles may alias one body, so the
//! registry stores them behind `Arc<Mutex<..>>`.

use crate::{Error, Result};
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;

/// A body shared between a request descriptor and boundary handles.
///
/// Replacing a request's post data drops the request's reference; the object
/// itself lives until the last handle or descriptor referencing it goes away.
pub type SharedPostData = Arc<Mutex<PostData>>;

/// One element of a request body
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PostDataElement {
    /// In-memory payload bytes
    Bytes(Bytes),
    /// Path to a file read when the request is sent
    File(String),
}

impl PostDataElement {
    /// Payload size in bytes, when known without touching the filesystem
    pub fn byte_len(&self) -> Option<usize> {
        match self {
            PostDataElement::Bytes(bytes) => Some(bytes.len()),
            PostDataElement::File(_) => None,
        }
    }
}

/// Request body descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PostData {
    read_only: bool,
    elements: Vec<PostDataElement>,
}

impl PostData {
    /// Create a new, empty, mutable body
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a body holding a single bytes element
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            read_only: false,
            elements: vec![PostDataElement::Bytes(bytes.into())],
        }
    }

    /// Check whether the body rejects mutation
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Number of elements
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Elements in order
    pub fn elements(&self) -> &[PostDataElement] {
        &self.elements
    }

    /// Append an element
    pub fn add_element(&mut self, element: PostDataElement) -> Result<()> {
        if self.read_only {
            return Err(Error::ReadOnly);
        }
        self.elements.push(element);
        Ok(())
    }

    /// Remove all elements
    pub fn remove_elements(&mut self) -> Result<()> {
        if self.read_only {
            return Err(Error::ReadOnly);
        }
        self.elements.clear();
        Ok(())
    }

    /// One-way transition to read-only; there is no way back
    pub(crate) fn freeze(&mut self) {
        self.read_only = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_count() {
        let mut body = PostData::new();
        assert_eq!(body.element_count(), 0);

        body.add_element(PostDataElement::Bytes(Bytes::from_static(b"a=1")))
            .unwrap();
        body.add_element(PostDataElement::File("/tmp/upload.bin".to_string()))
            .unwrap();

        assert_eq!(body.element_count(), 2);
        assert_eq!(body.elements()[0].byte_len(), Some(3));
        assert_eq!(body.elements()[1].byte_len(), None);
    }

    #[test]
    fn test_from_bytes() {
        let body = PostData::from_bytes("hello");
        assert_eq!(body.element_count(), 1);
        assert_eq!(
            body.elements()[0],
            PostDataElement::Bytes(Bytes::from_static(b"hello"))
        );
    }

    #[test]
    fn test_frozen_body_rejects_mutation() {
        let mut body = PostData::from_bytes("payload");
        body.freeze();

        assert!(body.is_read_only());
        assert_eq!(
            body.add_element(PostDataElement::Bytes(Bytes::new())),
            Err(Error::ReadOnly)
        );
        assert_eq!(body.remove_elements(), Err(Error::ReadOnly));
        assert_eq!(body.element_count(), 1);
    }
}

//! Request descriptor model
//!
//! A [`RequestDescriptor`] carries the fields of one HTTP-like request moving
//! through an engine's network/navigation pipeline. Every mutator is gated by
//! a single whole-object read-only flag: the engine treats "in flight" as a
//! state of the request, not of individual fields, so a read-only descriptor
//! rejects all mutation rather than allowing partial updates.

use crate::classify::{ResourceType, TransitionType};
use crate::header::HeaderMap;
use crate::post_data::{PostData, SharedPostData};
use crate::{Error, Result};
use bitflags::bitflags;

/// Referrer-forwarding policies
///
/// Closed set; raw values outside it are rejected at the boundary before any
/// state is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReferrerPolicy {
    /// "no-referrer"
    NoReferrer = 0,
    /// "no-referrer-when-downgrade"
    NoReferrerWhenDowngrade = 1,
    /// "origin"
    Origin = 2,
    /// "same-origin"
    SameOrigin = 3,
    /// "origin-when-cross-origin"
    OriginWhenCrossOrigin = 4,
    /// "unsafe-url"
    UnsafeUrl = 5,
    /// "strict-origin"
    StrictOrigin = 6,
    /// "strict-origin-when-cross-origin"
    #[default]
    StrictOriginWhenCrossOrigin = 7,
}

impl ReferrerPolicy {
    /// Decode a raw boundary value
    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => ReferrerPolicy::NoReferrer,
            1 => ReferrerPolicy::NoReferrerWhenDowngrade,
            2 => ReferrerPolicy::Origin,
            3 => ReferrerPolicy::SameOrigin,
            4 => ReferrerPolicy::OriginWhenCrossOrigin,
            5 => ReferrerPolicy::UnsafeUrl,
            6 => ReferrerPolicy::StrictOrigin,
            7 => ReferrerPolicy::StrictOriginWhenCrossOrigin,
            _ => return None,
        })
    }

    /// Raw boundary value
    pub fn as_raw(self) -> u32 {
        self as u32
    }

    /// Policy name as it appears in the Referrer-Policy header
    pub fn as_str(self) -> &'static str {
        match self {
            ReferrerPolicy::NoReferrer => "no-referrer",
            ReferrerPolicy::NoReferrerWhenDowngrade => "no-referrer-when-downgrade",
            ReferrerPolicy::Origin => "origin",
            ReferrerPolicy::SameOrigin => "same-origin",
            ReferrerPolicy::OriginWhenCrossOrigin => "origin-when-cross-origin",
            ReferrerPolicy::UnsafeUrl => "unsafe-url",
            ReferrerPolicy::StrictOrigin => "strict-origin",
            ReferrerPolicy::StrictOriginWhenCrossOrigin => "strict-origin-when-cross-origin",
        }
    }
}

impl std::fmt::Display for ReferrerPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

bitflags! {
    /// Engine-defined request behavior flags
    ///
    /// The boundary exchanges these as a raw bitmask and retains bits it does
    /// not know about, so engine-private flags survive a round trip.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[cfg_attr(feature = "serde", serde(transparent))]
    pub struct RequestFlags: u32 {
        /// Read from the cache if possible, without validating
        const SKIP_CACHE = 1 << 0;
        /// Fail rather than hit the network on a cache miss
        const ONLY_FROM_CACHE = 1 << 1;
        /// Bypass the cache entirely
        const DISABLE_CACHE = 1 << 2;
        /// Send cookies and saved credentials with the request
        const ALLOW_STORED_CREDENTIALS = 1 << 3;
        /// Report upload progress events
        const REPORT_UPLOAD_PROGRESS = 1 << 4;
        /// Discard the response body as it arrives
        const NO_DOWNLOAD_DATA = 1 << 5;
        /// Do not retry on a 5xx response
        const NO_RETRY_ON_5XX = 1 << 6;
        /// Stop processing when a redirect is received
        const STOP_ON_REDIRECT = 1 << 7;
    }
}

/// One HTTP-like request flowing through the engine pipeline
///
/// Field access goes through methods so the read-only gate and the
/// referrer-pair invariant cannot be bypassed. The identifier is 0 until the
/// descriptor enters a registry, which assigns the real one.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RequestDescriptor {
    identifier: u64,
    read_only: bool,
    url: String,
    method: String,
    referrer_url: String,
    referrer_policy: ReferrerPolicy,
    #[cfg_attr(feature = "serde", serde(skip))]
    post_data: Option<SharedPostData>,
    headers: HeaderMap,
    flags: RequestFlags,
    first_party_for_cookies: String,
    resource_type: ResourceType,
    transition_type: TransitionType,
}

impl RequestDescriptor {
    /// Create a new, empty, mutable descriptor with the default method (GET)
    pub fn new() -> Self {
        Self {
            identifier: 0,
            read_only: false,
            url: String::new(),
            method: "GET".to_string(),
            referrer_url: String::new(),
            referrer_policy: ReferrerPolicy::default(),
            post_data: None,
            headers: HeaderMap::new(),
            flags: RequestFlags::empty(),
            first_party_for_cookies: String::new(),
            resource_type: ResourceType::default(),
            transition_type: TransitionType::default(),
        }
    }

    /// Identifier assigned by the registry; 0 means not yet registered
    pub fn identifier(&self) -> u64 {
        self.identifier
    }

    pub(crate) fn assign_identifier(&mut self, identifier: u64) {
        self.identifier = identifier;
    }

    /// Check whether the descriptor rejects mutation
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Absolute request URL (possibly empty)
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Set the request URL
    pub fn set_url(&mut self, url: impl Into<String>) -> Result<()> {
        self.check_mutable()?;
        self.url = url.into();
        Ok(())
    }

    /// HTTP method token
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Set the HTTP method token
    pub fn set_method(&mut self, method: impl Into<String>) -> Result<()> {
        self.check_mutable()?;
        self.method = method.into();
        Ok(())
    }

    /// Referrer URL, set only together with the policy via [`set_referrer`]
    ///
    /// [`set_referrer`]: Self::set_referrer
    pub fn referrer_url(&self) -> &str {
        &self.referrer_url
    }

    /// Referrer policy, set only together with the URL via [`set_referrer`]
    ///
    /// [`set_referrer`]: Self::set_referrer
    pub fn referrer_policy(&self) -> ReferrerPolicy {
        self.referrer_policy
    }

    /// Update the referrer URL and policy as a pair
    ///
    /// The two fields are never written independently, so no reader can
    /// observe a URL from one referrer and a policy from another.
    pub fn set_referrer(&mut self, url: impl Into<String>, policy: ReferrerPolicy) -> Result<()> {
        self.check_mutable()?;
        self.referrer_url = url.into();
        self.referrer_policy = policy;
        Ok(())
    }

    /// The attached body, if any
    pub fn post_data(&self) -> Option<&SharedPostData> {
        self.post_data.as_ref()
    }

    /// Replace the attached body, releasing the reference to the prior one
    pub fn set_post_data(&mut self, post_data: Option<SharedPostData>) -> Result<()> {
        self.check_mutable()?;
        self.post_data = post_data;
        Ok(())
    }

    /// First value for a header name (case-insensitive); `None` when absent
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Set one header
    ///
    /// With `overwrite` true every existing value for the name is replaced by
    /// the single given value; with `overwrite` false the value is appended
    /// and existing ones survive.
    pub fn set_header(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        overwrite: bool,
    ) -> Result<()> {
        self.check_mutable()?;
        if overwrite {
            self.headers.insert(name, value);
        } else {
            self.headers.append(name, value);
        }
        Ok(())
    }

    /// All headers, in insertion order
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Replace the entire header set
    pub fn set_headers(&mut self, headers: HeaderMap) -> Result<()> {
        self.check_mutable()?;
        self.headers = headers;
        Ok(())
    }

    /// Replace URL, method, body, and header set in one operation
    ///
    /// On a read-only descriptor nothing is touched; there is no partial
    /// application.
    pub fn set_all(
        &mut self,
        url: impl Into<String>,
        method: impl Into<String>,
        post_data: Option<SharedPostData>,
        headers: HeaderMap,
    ) -> Result<()> {
        self.check_mutable()?;
        self.url = url.into();
        self.method = method.into();
        self.post_data = post_data;
        self.headers = headers;
        Ok(())
    }

    /// Request behavior flags
    pub fn flags(&self) -> RequestFlags {
        self.flags
    }

    /// Replace the request behavior flags
    pub fn set_flags(&mut self, flags: RequestFlags) -> Result<()> {
        self.check_mutable()?;
        self.flags = flags;
        Ok(())
    }

    /// URL used for cookie same-site evaluation
    pub fn first_party_for_cookies(&self) -> &str {
        &self.first_party_for_cookies
    }

    /// Set the URL used for cookie same-site evaluation
    pub fn set_first_party_for_cookies(&mut self, url: impl Into<String>) -> Result<()> {
        self.check_mutable()?;
        self.first_party_for_cookies = url.into();
        Ok(())
    }

    /// Engine-assigned resource classification; no setter exists
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// Engine-assigned navigation transition; no setter exists
    pub fn transition_type(&self) -> TransitionType {
        self.transition_type
    }

    /// One-way transition to read-only, also freezing an attached body
    ///
    /// There is no transition back to mutable.
    pub fn freeze(&mut self) {
        self.read_only = true;
        if let Some(body) = &self.post_data {
            body.lock().freeze();
        }
    }

    fn check_mutable(&self) -> Result<()> {
        if self.read_only {
            Err(Error::ReadOnly)
        } else {
            Ok(())
        }
    }
}

impl Default for RequestDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for engine-constructed descriptors
///
/// The only path through which resource type, transition type, and the
/// read-only flag are ever set: boundary callers get a plain mutable
/// descriptor from the registry, the engine builds classified (and possibly
/// already in-flight, hence read-only) ones here.
pub struct RequestBuilder {
    descriptor: RequestDescriptor,
    read_only: bool,
}

impl RequestBuilder {
    /// Start a builder for the given URL
    pub fn new(url: impl Into<String>) -> Self {
        let mut descriptor = RequestDescriptor::new();
        descriptor.url = url.into();
        Self {
            descriptor,
            read_only: false,
        }
    }

    /// Set the HTTP method token
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.descriptor.method = method.into();
        self
    }

    /// Set the referrer pair
    pub fn referrer(mut self, url: impl Into<String>, policy: ReferrerPolicy) -> Self {
        self.descriptor.referrer_url = url.into();
        self.descriptor.referrer_policy = policy;
        self
    }

    /// Attach a body
    pub fn post_data(mut self, post_data: PostData) -> Self {
        self.descriptor.post_data = Some(std::sync::Arc::new(parking_lot::Mutex::new(post_data)));
        self
    }

    /// Append one header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.descriptor.headers.append(name, value);
        self
    }

    /// Replace the header set
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.descriptor.headers = headers;
        self
    }

    /// Set request behavior flags
    pub fn flags(mut self, flags: RequestFlags) -> Self {
        self.descriptor.flags = flags;
        self
    }

    /// Set the cookie first-party URL
    pub fn first_party_for_cookies(mut self, url: impl Into<String>) -> Self {
        self.descriptor.first_party_for_cookies = url.into();
        self
    }

    /// Classify the request's pipeline role
    pub fn resource_type(mut self, resource_type: ResourceType) -> Self {
        self.descriptor.resource_type = resource_type;
        self
    }

    /// Classify the navigation transition
    pub fn transition_type(mut self, transition_type: TransitionType) -> Self {
        self.descriptor.transition_type = transition_type;
        self
    }

    /// Mark the descriptor read-only (e.g. the engine already owns it)
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Build the descriptor
    pub fn build(mut self) -> RequestDescriptor {
        if self.read_only {
            self.descriptor.freeze();
        }
        self.descriptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{TransitionQualifiers, TransitionSource};

    #[test]
    fn test_new_descriptor_defaults() {
        let req = RequestDescriptor::new();
        assert_eq!(req.identifier(), 0);
        assert!(!req.is_read_only());
        assert_eq!(req.url(), "");
        assert_eq!(req.method(), "GET");
        assert_eq!(req.referrer_url(), "");
        assert_eq!(
            req.referrer_policy(),
            ReferrerPolicy::StrictOriginWhenCrossOrigin
        );
        assert!(req.post_data().is_none());
        assert!(req.headers().is_empty());
        assert_eq!(req.flags(), RequestFlags::empty());
        assert_eq!(req.resource_type(), ResourceType::SubResource);
        assert_eq!(req.transition_type(), TransitionType::default());
    }

    #[test]
    fn test_referrer_set_as_pair() {
        let mut req = RequestDescriptor::new();
        req.set_referrer("https://a.example/", ReferrerPolicy::Origin)
            .unwrap();

        assert_eq!(req.referrer_url(), "https://a.example/");
        assert_eq!(req.referrer_policy(), ReferrerPolicy::Origin);
    }

    #[test]
    fn test_read_only_rejects_every_mutator() {
        let mut req = RequestBuilder::new("https://example.com/")
            .method("POST")
            .referrer("https://ref.example/", ReferrerPolicy::SameOrigin)
            .header("X-Keep", "yes")
            .flags(RequestFlags::SKIP_CACHE)
            .first_party_for_cookies("https://example.com/")
            .read_only()
            .build();

        assert!(req.is_read_only());
        assert_eq!(req.set_url("https://other/"), Err(Error::ReadOnly));
        assert_eq!(req.set_method("PUT"), Err(Error::ReadOnly));
        assert_eq!(
            req.set_referrer("https://x/", ReferrerPolicy::NoReferrer),
            Err(Error::ReadOnly)
        );
        assert_eq!(req.set_post_data(None), Err(Error::ReadOnly));
        assert_eq!(req.set_header("X-New", "1", true), Err(Error::ReadOnly));
        assert_eq!(req.set_headers(HeaderMap::new()), Err(Error::ReadOnly));
        assert_eq!(
            req.set_all("https://x/", "GET", None, HeaderMap::new()),
            Err(Error::ReadOnly)
        );
        assert_eq!(
            req.set_flags(RequestFlags::DISABLE_CACHE),
            Err(Error::ReadOnly)
        );
        assert_eq!(
            req.set_first_party_for_cookies("https://x/"),
            Err(Error::ReadOnly)
        );

        // Nothing observable changed
        assert_eq!(req.url(), "https://example.com/");
        assert_eq!(req.method(), "POST");
        assert_eq!(req.referrer_url(), "https://ref.example/");
        assert_eq!(req.referrer_policy(), ReferrerPolicy::SameOrigin);
        assert_eq!(req.header("x-keep"), Some("yes"));
        assert_eq!(req.flags(), RequestFlags::SKIP_CACHE);
        assert_eq!(req.first_party_for_cookies(), "https://example.com/");
    }

    #[test]
    fn test_set_all_replaces_all_four_fields() {
        let mut req = RequestDescriptor::new();
        req.set_header("Old", "gone", false).unwrap();

        let body = std::sync::Arc::new(parking_lot::Mutex::new(PostData::from_bytes("k=v")));
        let headers: HeaderMap = [("Content-Type", "application/x-www-form-urlencoded")]
            .into_iter()
            .collect();
        req.set_all("https://example.com/submit", "POST", Some(body), headers)
            .unwrap();

        assert_eq!(req.url(), "https://example.com/submit");
        assert_eq!(req.method(), "POST");
        assert_eq!(req.post_data().unwrap().lock().element_count(), 1);
        assert_eq!(req.header("Old"), None);
        assert_eq!(
            req.header("content-type"),
            Some("application/x-www-form-urlencoded")
        );
    }

    #[test]
    fn test_replacing_post_data_releases_prior_reference() {
        let first = std::sync::Arc::new(parking_lot::Mutex::new(PostData::from_bytes("one")));
        let mut req = RequestDescriptor::new();
        req.set_post_data(Some(first.clone())).unwrap();
        assert_eq!(std::sync::Arc::strong_count(&first), 2);

        req.set_post_data(Some(std::sync::Arc::new(parking_lot::Mutex::new(
            PostData::from_bytes("two"),
        ))))
        .unwrap();
        assert_eq!(std::sync::Arc::strong_count(&first), 1);
    }

    #[test]
    fn test_freeze_propagates_to_body() {
        let mut req = RequestBuilder::new("https://example.com/upload")
            .method("POST")
            .post_data(PostData::from_bytes("payload"))
            .build();

        req.freeze();
        assert!(req.post_data().unwrap().lock().is_read_only());
    }

    #[test]
    fn test_builder_sets_classification() {
        let req = RequestBuilder::new("https://example.com/app")
            .resource_type(ResourceType::MainFrame)
            .transition_type(TransitionType::new(
                TransitionSource::Typed,
                TransitionQualifiers::FORWARD_BACK,
            ))
            .build();

        assert_eq!(req.resource_type(), ResourceType::MainFrame);
        assert_eq!(req.transition_type().source(), TransitionSource::Typed);
        assert!(req
            .transition_type()
            .qualifiers()
            .contains(TransitionQualifiers::FORWARD_BACK));
        assert!(!req.transition_type().is_redirect());
    }

    #[test]
    fn test_flags_retain_unknown_bits() {
        let raw = RequestFlags::SKIP_CACHE.bits() | 0x8000_0000;
        let flags = RequestFlags::from_bits_retain(raw);

        let mut req = RequestDescriptor::new();
        req.set_flags(flags).unwrap();
        assert_eq!(req.flags().bits(), raw);
    }

    #[test]
    fn test_referrer_policy_raw_round_trip() {
        for raw in 0..=7 {
            let policy = ReferrerPolicy::from_raw(raw).unwrap();
            assert_eq!(policy.as_raw(), raw);
        }
        assert_eq!(ReferrerPolicy::from_raw(8), None);
        assert_eq!(ReferrerPolicy::from_raw(99), None);
    }

    #[test]
    fn test_referrer_policy_names() {
        assert_eq!(ReferrerPolicy::NoReferrer.as_str(), "no-referrer");
        assert_eq!(
            ReferrerPolicy::default().to_string(),
            "strict-origin-when-cross-origin"
        );
    }
}

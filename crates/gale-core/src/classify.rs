//! Engine-assigned request classifications
//!
//! Resource type and transition type are fixed by the engine's
//! navigation/resource pipeline when a request is built and are read-only
//! through the boundary. Both cross the boundary as raw u32 codes, so the
//! numeric layout here is part of the interop surface.

use bitflags::bitflags;

/// Role a request plays in the load pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResourceType {
    /// Top-level frame navigation
    MainFrame = 0,
    /// Frame or iframe navigation
    SubFrame = 1,
    /// CSS stylesheet
    Stylesheet = 2,
    /// External script
    Script = 3,
    /// Image (favicons excluded)
    Image = 4,
    /// Font
    FontResource = 5,
    /// Other sub-resource; also the classification for requests no pipeline
    /// stage has attributed yet
    #[default]
    SubResource = 6,
    /// Object or embed element
    Object = 7,
    /// Media resource
    Media = 8,
    /// Dedicated worker main script
    Worker = 9,
    /// Shared worker main script
    SharedWorker = 10,
    /// Prefetch request
    Prefetch = 11,
    /// Favicon
    Favicon = 12,
    /// XMLHttpRequest or fetch()
    Xhr = 13,
    /// Ping (`<a ping>`, navigator.sendBeacon)
    Ping = 14,
    /// Service worker main script
    ServiceWorker = 15,
    /// Plugin-requested resource
    PluginResource = 16,
}

impl ResourceType {
    /// Decode a raw boundary value
    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => ResourceType::MainFrame,
            1 => ResourceType::SubFrame,
            2 => ResourceType::Stylesheet,
            3 => ResourceType::Script,
            4 => ResourceType::Image,
            5 => ResourceType::FontResource,
            6 => ResourceType::SubResource,
            7 => ResourceType::Object,
            8 => ResourceType::Media,
            9 => ResourceType::Worker,
            10 => ResourceType::SharedWorker,
            11 => ResourceType::Prefetch,
            12 => ResourceType::Favicon,
            13 => ResourceType::Xhr,
            14 => ResourceType::Ping,
            15 => ResourceType::ServiceWorker,
            16 => ResourceType::PluginResource,
            _ => return None,
        })
    }

    /// Raw boundary value
    pub fn as_raw(self) -> u32 {
        self as u32
    }

    /// Kebab-case name
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::MainFrame => "main-frame",
            ResourceType::SubFrame => "sub-frame",
            ResourceType::Stylesheet => "stylesheet",
            ResourceType::Script => "script",
            ResourceType::Image => "image",
            ResourceType::FontResource => "font-resource",
            ResourceType::SubResource => "sub-resource",
            ResourceType::Object => "object",
            ResourceType::Media => "media",
            ResourceType::Worker => "worker",
            ResourceType::SharedWorker => "shared-worker",
            ResourceType::Prefetch => "prefetch",
            ResourceType::Favicon => "favicon",
            ResourceType::Xhr => "xhr",
            ResourceType::Ping => "ping",
            ResourceType::ServiceWorker => "service-worker",
            ResourceType::PluginResource => "plugin-resource",
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a main-frame navigation was initiated
///
/// Stored in the low byte of the packed transition value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransitionSource {
    /// Followed a link
    #[default]
    Link = 0,
    /// URL typed into the address bar
    Typed = 1,
    /// Suggested entry chosen from the UI (bookmark, history)
    AutoBookmark = 2,
    /// Subframe navigation the user did not request
    AutoSubframe = 3,
    /// Subframe navigation the user explicitly requested
    ManualSubframe = 4,
    /// Form submission
    FormSubmit = 5,
    /// Page reload
    Reload = 6,
}

impl TransitionSource {
    /// Decode the source stored in the low byte of a packed value
    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => TransitionSource::Link,
            1 => TransitionSource::Typed,
            2 => TransitionSource::AutoBookmark,
            3 => TransitionSource::AutoSubframe,
            4 => TransitionSource::ManualSubframe,
            5 => TransitionSource::FormSubmit,
            6 => TransitionSource::Reload,
            _ => return None,
        })
    }
}

bitflags! {
    /// Qualifier bits combined with a [`TransitionSource`]
    ///
    /// Bit positions follow the packed layout the engine reports: qualifiers
    /// occupy the high byte range, leaving the low byte for the source.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[cfg_attr(feature = "serde", serde(transparent))]
    pub struct TransitionQualifiers: u32 {
        /// Navigation came from a back/forward traversal
        const FORWARD_BACK = 0x0100_0000;
        /// Navigation started in the address bar
        const FROM_ADDRESS_BAR = 0x0200_0000;
        /// Navigation to the home page
        const HOME_PAGE = 0x0400_0000;
        /// Redirect issued by script or a meta refresh
        const CLIENT_REDIRECT = 0x4000_0000;
        /// Redirect issued by an HTTP response header
        const SERVER_REDIRECT = 0x8000_0000;
    }
}

/// Navigation transition classification: source plus qualifier bits
///
/// Meaningful only for main-frame navigation requests; sub-resource requests
/// report the default value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransitionType {
    source: TransitionSource,
    qualifiers: TransitionQualifiers,
}

impl TransitionType {
    /// Mask selecting the source byte of a packed value
    pub const SOURCE_MASK: u32 = 0x0000_00ff;
    /// Mask selecting the qualifier bits of a packed value
    pub const QUALIFIER_MASK: u32 = 0xffff_ff00;

    /// Combine a source with qualifier bits
    pub fn new(source: TransitionSource, qualifiers: TransitionQualifiers) -> Self {
        Self { source, qualifiers }
    }

    /// The navigation source
    pub fn source(self) -> TransitionSource {
        self.source
    }

    /// The qualifier bits
    pub fn qualifiers(self) -> TransitionQualifiers {
        self.qualifiers
    }

    /// Check whether the navigation is any kind of redirect
    pub fn is_redirect(self) -> bool {
        self.qualifiers.intersects(
            TransitionQualifiers::CLIENT_REDIRECT | TransitionQualifiers::SERVER_REDIRECT,
        )
    }

    /// Pack into the single u32 the boundary reports
    pub fn as_raw(self) -> u32 {
        self.source as u32 | self.qualifiers.bits()
    }

    /// Decode a packed value; unknown qualifier bits are dropped, an unknown
    /// source byte rejects the whole value
    pub fn from_raw(raw: u32) -> Option<Self> {
        let source = TransitionSource::from_raw(raw & Self::SOURCE_MASK)?;
        let qualifiers = TransitionQualifiers::from_bits_truncate(raw & Self::QUALIFIER_MASK);
        Some(Self { source, qualifiers })
    }
}

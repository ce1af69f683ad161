use serde::{Deserialize, Serialize};
use url::Url;

use crate::TabtoneResult;

/// Attribute written onto a page's icon link element so the last known
/// original favicon survives an engine restart.
pub const SATURATED_ORIGINAL_ATTR: &str = "data-saturated-original";

/// Identifier of a host-managed tab. Created and destroyed entirely by the
/// host; this system only keys maps by it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TabId(pub u32);

impl std::fmt::Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TabId {
    fn from(raw: u32) -> Self {
        TabId(raw)
    }
}

/// A favicon location: either a network/resource URL or a data URL
/// generated by the transformer. The two are only distinguishable by the
/// `data:` scheme prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaviconUrl(String);

impl FaviconUrl {
    pub fn new(raw: impl Into<String>) -> Self {
        FaviconUrl(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether this is a generated/portable data URL rather than a
    /// network-sourced location.
    #[must_use]
    pub fn is_data_url(&self) -> bool {
        self.0.starts_with("data:")
    }

    /// Whether this URL uses one of the host's privileged internal schemes
    /// (`chrome:` and friends). Such icons cannot be read or rewritten.
    #[must_use]
    pub fn is_internal(&self, schemes: &[String]) -> bool {
        schemes.iter().any(|scheme| self.0.starts_with(scheme))
    }
}

impl std::fmt::Display for FaviconUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FaviconUrl {
    fn from(raw: &str) -> Self {
        FaviconUrl(raw.to_string())
    }
}

impl From<String> for FaviconUrl {
    fn from(raw: String) -> Self {
        FaviconUrl(raw)
    }
}

impl AsRef<str> for FaviconUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Snapshot of a tab as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabSnapshot {
    /// Host identifier of the tab.
    pub id: TabId,
    /// Whether the host currently considers the tab active.
    pub active: bool,
    /// Page URL the tab is showing, if the host exposes it.
    pub page_url: Option<Url>,
    /// Favicon URL the tab currently displays, if any.
    pub favicon_url: Option<FaviconUrl>,
}

impl TabSnapshot {
    pub fn new(id: impl Into<TabId>) -> Self {
        TabSnapshot {
            id: id.into(),
            active: false,
            page_url: None,
            favicon_url: None,
        }
    }
}

/// Desired icon write shipped through the page-scripting capability.
///
/// The injected script interprets the patch as follows: when `href` is set,
/// every existing `link[rel~=icon]` element is pointed at it. When
/// `saturated_original` is set, a bare icon link is first created if the page
/// has none (using `saturated_original` as its href), and the value is written
/// to the [`SATURATED_ORIGINAL_ATTR`] attribute so it survives an engine
/// restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconPatch {
    pub href: Option<FaviconUrl>,
    pub saturated_original: Option<FaviconUrl>,
}

impl IconPatch {
    /// Patch that points every existing icon link at `href`.
    pub fn set_href(href: impl Into<FaviconUrl>) -> Self {
        IconPatch {
            href: Some(href.into()),
            saturated_original: None,
        }
    }

    /// Patch that stamps `url` onto the page as the recorded original.
    pub fn persist_original(url: impl Into<FaviconUrl>) -> Self {
        IconPatch {
            href: None,
            saturated_original: Some(url.into()),
        }
    }

    /// JSON payload handed to the host's injected page script.
    pub fn injection_json(&self) -> TabtoneResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

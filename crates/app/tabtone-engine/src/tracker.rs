use std::collections::HashMap;

use url::Url;

use tabtone_core::{FaviconUrl, PlaceholderPolicy, TabId};

/// What [`TabStateTracker::record`] decided to do with a reported favicon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// New original recorded for the tab.
    Recorded,
    /// Empty, or identical to what is already recorded.
    Unchanged,
    /// A known tab reported a URL the transform pipeline already produced
    /// or consumed, which means the change was our own doing.
    TransformEcho,
    /// The browser's stand-in favicon for pages that never declared one.
    PlaceholderIgnored,
    /// Data URLs are never adopted as originals.
    DataUrlIgnored,
}

/// Remembers the last genuine favicon URL each tab reported.
///
/// The map only ever holds URLs that passed the recording guards, so a hit
/// here is always safe to restore verbatim.
pub struct TabStateTracker {
    originals: HashMap<TabId, FaviconUrl>,
    placeholder: PlaceholderPolicy,
}

impl TabStateTracker {
    pub fn new(placeholder: PlaceholderPolicy) -> Self {
        Self {
            originals: HashMap::new(),
            placeholder,
        }
    }

    /// Consider `url` as the new original favicon of `tab`.
    ///
    /// `seen_by_cache` is the transform cache's verdict on `url`; combined
    /// with an existing entry it marks the report as an echo of our own
    /// favicon writes rather than a navigation.
    pub fn record(
        &mut self,
        tab: TabId,
        url: &FaviconUrl,
        page_url: Option<&Url>,
        seen_by_cache: bool,
    ) -> RecordOutcome {
        if url.is_empty() || self.originals.get(&tab) == Some(url) {
            return RecordOutcome::Unchanged;
        }

        if self.originals.contains_key(&tab) && seen_by_cache {
            return RecordOutcome::TransformEcho;
        }

        if self.placeholder.matches(url) && !page_url.is_some_and(|u| self.placeholder.owns_page(u))
        {
            return RecordOutcome::PlaceholderIgnored;
        }

        if url.is_data_url() {
            return RecordOutcome::DataUrlIgnored;
        }

        self.originals.insert(tab, url.clone());
        RecordOutcome::Recorded
    }

    /// The recorded original for `tab`, if any.
    pub fn original_for(&self, tab: TabId) -> Option<&FaviconUrl> {
        self.originals.get(&tab)
    }

    /// Adopt an original recovered from a page attribute, typically after a
    /// restart wiped the in-memory map. Data URLs and empty values are
    /// refused so a stamped rendition can never pose as an original.
    pub fn adopt_recovered(&mut self, tab: TabId, url: &FaviconUrl) -> bool {
        if url.is_empty() || url.is_data_url() {
            return false;
        }
        self.originals.insert(tab, url.clone());
        true
    }

    /// Drop all state for a closed tab.
    pub fn forget(&mut self, tab: TabId) -> Option<FaviconUrl> {
        self.originals.remove(&tab)
    }

    pub fn len(&self) -> usize {
        self.originals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.originals.is_empty()
    }
}

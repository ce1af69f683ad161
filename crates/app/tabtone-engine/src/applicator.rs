use std::sync::Arc;

use tracing::debug;

use crate::host::PageScripting;
use tabtone_core::{FaviconUrl, IconPatch, TabId, TabtoneResult};

/// Applies icon writes to pages.
///
/// Hosts refuse injection on browser UI pages and extension stores; those
/// failures are logged and reported as `false` instead of propagated.
pub struct IconApplicator {
    pages: Arc<dyn PageScripting>,
}

impl IconApplicator {
    pub fn new(pages: Arc<dyn PageScripting>) -> Self {
        Self { pages }
    }

    /// Point the page's icon links at `url`.
    pub async fn set_href(&self, tab: TabId, url: &FaviconUrl) -> bool {
        let patch = IconPatch::set_href(url.clone());
        match self.pages.apply(tab, &patch).await {
            Ok(()) => true,
            Err(e) => {
                debug!("Could not set favicon on tab {}: {}", tab, e);
                false
            }
        }
    }

    /// Stamp `url` onto the page as the recorded original, creating an icon
    /// link if the page has none.
    pub async fn persist_original(&self, tab: TabId, url: &FaviconUrl) -> bool {
        let patch = IconPatch::persist_original(url.clone());
        match self.pages.apply(tab, &patch).await {
            Ok(()) => true,
            Err(e) => {
                debug!("Could not stamp original favicon on tab {}: {}", tab, e);
                false
            }
        }
    }

    /// Read the stamped original back, if the page still carries one.
    pub async fn read_original(&self, tab: TabId) -> TabtoneResult<Option<FaviconUrl>> {
        self.pages.read_original_attr(tab).await
    }
}

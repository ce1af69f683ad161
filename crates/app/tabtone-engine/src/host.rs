//! Capability traits the engine needs from the hosting browser.
//!
//! The engine never talks to a browser API directly. Embedders implement
//! these traits over whatever bridge they have (native messaging, an
//! extension RPC layer, a test fake) and hand them to the engine.

use async_trait::async_trait;

use tabtone_core::{FaviconUrl, IconPatch, TabId, TabSnapshot, TabtoneResult};

/// Scope selector for [`TabHost::query_tabs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabQuery {
    /// Every tab the host knows about.
    All,
    /// Tabs the host currently marks active (one per window).
    Active,
    /// Tabs the host does not mark active.
    Inactive,
}

/// Focus and lifecycle notifications delivered by the host browser.
#[derive(Debug, Clone)]
pub enum TabEvent {
    /// A tab gained focus.
    Activated { tab_id: TabId },
    /// A tab reported a favicon URL change. `url` is the newly reported
    /// value; `snapshot` is the host's view of the tab at that moment.
    FaviconChanged {
        tab_id: TabId,
        url: Option<FaviconUrl>,
        snapshot: TabSnapshot,
    },
    /// The engine process started, typically after an install or restart.
    Started,
    /// A tab was closed.
    Removed { tab_id: TabId },
}

/// Read access to the host's tab list.
#[async_trait]
pub trait TabHost: Send + Sync {
    /// Snapshots of the tabs matching `query`.
    async fn query_tabs(&self, query: TabQuery) -> TabtoneResult<Vec<TabSnapshot>>;

    /// Snapshot of a single tab, or `None` if the host no longer knows it.
    async fn tab(&self, id: TabId) -> TabtoneResult<Option<TabSnapshot>>;
}

/// Script injection into a tab's page.
#[async_trait]
pub trait PageScripting: Send + Sync {
    /// Apply an icon patch to the page. Fails on pages the host refuses to
    /// inject into (browser UI pages, stores, and the like).
    async fn apply(&self, tab: TabId, patch: &IconPatch) -> TabtoneResult<()>;

    /// Read the stamped original-favicon attribute back out of the page.
    async fn read_original_attr(&self, tab: TabId) -> TabtoneResult<Option<FaviconUrl>>;
}

/// Retrieval of raw favicon bytes for a URL.
#[async_trait]
pub trait IconFetcher: Send + Sync {
    async fn fetch(&self, url: &FaviconUrl) -> TabtoneResult<Vec<u8>>;
}

//! High-level tinting engine implementation

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    applicator::IconApplicator,
    cache::{CacheStats, FaviconCache},
    fetch::HttpIconFetcher,
    host::{IconFetcher, PageScripting, TabEvent, TabHost, TabQuery},
    tracker::{RecordOutcome, TabStateTracker},
    transform::IconTransformer,
};
use tabtone_core::{EngineConfig, FaviconUrl, TabId, TabSnapshot, TabtoneError, TabtoneResult};

/// Builder for creating TintEngine instances
pub struct TintEngineBuilder {
    config: Option<EngineConfig>,
    host: Option<Arc<dyn TabHost>>,
    pages: Option<Arc<dyn PageScripting>>,
    fetcher: Option<Arc<dyn IconFetcher>>,
}

impl TintEngineBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            config: None,
            host: None,
            pages: None,
            fetcher: None,
        }
    }

    /// Set the engine configuration
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the tab host capability
    pub fn with_host(mut self, host: Arc<dyn TabHost>) -> Self {
        self.host = Some(host);
        self
    }

    /// Set the page scripting capability
    pub fn with_pages(mut self, pages: Arc<dyn PageScripting>) -> Self {
        self.pages = Some(pages);
        self
    }

    /// Set the icon fetcher, replacing the default HTTP fetcher
    pub fn with_fetcher(mut self, fetcher: Arc<dyn IconFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Build the TintEngine
    pub fn build(self) -> TabtoneResult<TintEngine> {
        let config = self.config.unwrap_or_default();
        let host = self
            .host
            .ok_or_else(|| TabtoneError::invalid_config("a tab host is required"))?;
        let pages = self.pages.ok_or_else(|| {
            TabtoneError::invalid_config("a page scripting capability is required")
        })?;
        let fetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpIconFetcher::new()?),
        };

        debug!("Creating tint engine with config: {:?}", config);

        let transformer = IconTransformer::new(fetcher, config.transform_timeout);

        Ok(TintEngine {
            applicator: IconApplicator::new(pages),
            transformer,
            cache: FaviconCache::new(),
            tracker: Mutex::new(TabStateTracker::new(config.placeholder.clone())),
            active_tab: Mutex::new(None),
            host,
            config,
        })
    }
}

impl Default for TintEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters and state exposed for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    pub tracked_tabs: usize,
    pub active_tab: Option<TabId>,
    pub cache: CacheStats,
}

/// Drives favicon tinting from host tab events.
///
/// Inactive tabs get desaturated favicons; the active tab keeps, or gets
/// back, its original. All state lives in memory and is rebuilt from host
/// queries and page attributes after a restart.
pub struct TintEngine {
    config: EngineConfig,
    host: Arc<dyn TabHost>,
    applicator: IconApplicator,
    transformer: IconTransformer,
    cache: FaviconCache,
    tracker: Mutex<TabStateTracker>,
    active_tab: Mutex<Option<TabId>>,
}

impl TintEngine {
    /// Create a new builder for TintEngine
    pub fn builder() -> TintEngineBuilder {
        TintEngineBuilder::new()
    }

    /// Get the current configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The tab this engine last saw activated, if any.
    pub async fn active_tab(&self) -> Option<TabId> {
        *self.active_tab.lock().await
    }

    /// Get engine statistics
    pub async fn stats(&self) -> EngineStats {
        let tracked_tabs = self.tracker.lock().await.len();
        EngineStats {
            tracked_tabs,
            active_tab: *self.active_tab.lock().await,
            cache: self.cache.stats().await,
        }
    }

    /// Dispatch one host event.
    pub async fn handle_event(&self, event: TabEvent) -> TabtoneResult<()> {
        match event {
            TabEvent::Activated { tab_id } => self.on_activated(tab_id).await,
            TabEvent::FaviconChanged {
                tab_id,
                url,
                snapshot,
            } => self.on_favicon_changed(tab_id, url, snapshot).await,
            TabEvent::Started => self.on_started().await,
            TabEvent::Removed { tab_id } => self.on_removed(tab_id).await,
        }
    }

    /// Process events until the channel closes.
    ///
    /// Events are handled one at a time, so every refresh pass sees the
    /// state its triggering event left behind.
    pub fn spawn_event_loop(
        self: Arc<Self>,
        mut events: mpsc::UnboundedReceiver<TabEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            debug!("Tab event loop started");
            while let Some(event) = events.recv().await {
                if let Err(e) = self.handle_event(event).await {
                    warn!("Failed to handle tab event: {}", e);
                }
            }
            debug!("Tab event loop ended");
        })
    }

    /// Resolve the URL that restores `tab`'s colorful favicon.
    pub async fn saturated_url(&self, tab: TabId) -> TabtoneResult<Option<FaviconUrl>> {
        let snapshot = self
            .host
            .tab(tab)
            .await?
            .ok_or(TabtoneError::TabNotFound(tab))?;
        Ok(self.resolve_saturated(&snapshot).await)
    }

    async fn on_activated(&self, tab_id: TabId) -> TabtoneResult<()> {
        debug!("Tab {} activated", tab_id);
        *self.active_tab.lock().await = Some(tab_id);
        self.refresh(Some(tab_id)).await
    }

    async fn on_favicon_changed(
        &self,
        tab_id: TabId,
        url: Option<FaviconUrl>,
        snapshot: TabSnapshot,
    ) -> TabtoneResult<()> {
        let Some(url) = url else { return Ok(()) };

        let seen_by_cache = self.cache.has_seen(&url).await;
        let outcome = {
            let mut tracker = self.tracker.lock().await;
            tracker.record(tab_id, &url, snapshot.page_url.as_ref(), seen_by_cache)
        };

        if outcome != RecordOutcome::Recorded {
            debug!("Ignoring favicon change on tab {}: {:?}", tab_id, outcome);
            return Ok(());
        }

        debug!("Tab {} reported a new favicon", tab_id);

        // Stamp the original onto the page so it survives an engine restart.
        self.applicator.persist_original(tab_id, &url).await;

        let active = *self.active_tab.lock().await;
        self.refresh(active).await
    }

    async fn on_started(&self) -> TabtoneResult<()> {
        info!("Tint engine started; refreshing all tabs");
        *self.active_tab.lock().await = None;
        self.refresh(None).await
    }

    async fn on_removed(&self, tab_id: TabId) -> TabtoneResult<()> {
        if self.tracker.lock().await.forget(tab_id).is_some() {
            debug!("Dropped favicon state for closed tab {}", tab_id);
        }

        let mut active = self.active_tab.lock().await;
        if *active == Some(tab_id) {
            *active = None;
        }
        Ok(())
    }

    /// Desaturate every inactive tab, then saturate the active one.
    ///
    /// The saturation step runs after the desaturations have settled, so the
    /// active tab always ends a pass with its original favicon even when the
    /// host's own view of activity lags behind the triggering event.
    async fn refresh(&self, active: Option<TabId>) -> TabtoneResult<()> {
        let inactive = self.host.query_tabs(TabQuery::Inactive).await?;
        let passes = inactive
            .iter()
            .filter(|tab| Some(tab.id) != active)
            .map(|tab| self.desaturate_tab(tab));
        join_all(passes).await;

        match active {
            Some(tab_id) => {
                match self.host.tab(tab_id).await? {
                    Some(tab) => self.saturate_tab(&tab).await,
                    None => debug!("Active tab {} is gone; skipping saturation", tab_id),
                }
                Ok(())
            }
            None => {
                // No activation seen yet (fresh start): trust the host's flags.
                let active_tabs = self.host.query_tabs(TabQuery::Active).await?;
                for tab in &active_tabs {
                    self.saturate_tab(tab).await;
                }
                Ok(())
            }
        }
    }

    async fn desaturate_tab(&self, tab: &TabSnapshot) {
        let Some(url) = self.eligible_favicon(tab) else {
            return;
        };

        match self.cache.get_desaturated(url, &self.transformer).await {
            Ok(generated) => {
                self.applicator.set_href(tab.id, &generated).await;
            }
            Err(e) => warn!("Failed to desaturate favicon for tab {}: {}", tab.id, e),
        }
    }

    async fn saturate_tab(&self, tab: &TabSnapshot) {
        if self.eligible_favicon(tab).is_none() {
            return;
        }

        if let Some(url) = self.resolve_saturated(tab).await {
            self.applicator.set_href(tab.id, &url).await;
        }
    }

    /// The tab's favicon URL, if the tab is one this engine may touch.
    ///
    /// Tabs without a favicon, favicons served from browser-internal
    /// schemes, and pages living on browser-internal schemes are left alone.
    fn eligible_favicon<'a>(&self, tab: &'a TabSnapshot) -> Option<&'a FaviconUrl> {
        let url = tab.favicon_url.as_ref()?;
        if url.is_empty() || url.is_internal(&self.config.internal_schemes) {
            return None;
        }
        if let Some(page) = &tab.page_url {
            let scheme = format!("{}:", page.scheme());
            if self.config.internal_schemes.contains(&scheme) {
                return None;
            }
        }
        Some(url)
    }

    /// Resolution order for the original favicon: the tracker, then the
    /// reverse cache keyed by the displayed URL, then the attribute stamped
    /// onto the page, and finally whatever the host currently reports.
    async fn resolve_saturated(&self, tab: &TabSnapshot) -> Option<FaviconUrl> {
        {
            let tracker = self.tracker.lock().await;
            if let Some(url) = tracker.original_for(tab.id) {
                return Some(url.clone());
            }
        }

        let current = tab.favicon_url.clone();

        if let Some(displayed) = &current {
            if let Some(saturated) = self.cache.saturated_for(displayed).await {
                return Some(saturated);
            }
        }

        match self.applicator.read_original(tab.id).await {
            Ok(Some(stored)) => {
                let mut tracker = self.tracker.lock().await;
                if tracker.adopt_recovered(tab.id, &stored) {
                    debug!(
                        "Recovered original favicon for tab {} from page attribute",
                        tab.id
                    );
                    return Some(stored);
                }
            }
            Ok(None) => {}
            Err(e) => debug!("Could not read stored original from tab {}: {}", tab.id, e),
        }

        current
    }
}

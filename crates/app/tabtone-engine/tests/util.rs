//! Common test utilities for tabtone-engine integration tests

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use async_trait::async_trait;
use tabtone_engine::{
    EngineConfig, FaviconUrl, IconFetcher, IconPatch, PageScripting, TabEvent, TabHost, TabId,
    TabQuery, TabSnapshot, TabtoneError, TabtoneResult, TintEngine,
};
use url::Url;

/// In-memory tab host with a controllable set of tabs
#[derive(Default)]
pub struct FakeTabHost {
    tabs: Mutex<HashMap<TabId, TabSnapshot>>,
}

impl FakeTabHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, snapshot: TabSnapshot) {
        self.tabs.lock().unwrap().insert(snapshot.id, snapshot);
    }

    /// Mark one tab active and every other tab inactive
    #[allow(dead_code)]
    pub fn set_active(&self, id: TabId) {
        let mut tabs = self.tabs.lock().unwrap();
        for (tab_id, tab) in tabs.iter_mut() {
            tab.active = *tab_id == id;
        }
    }

    #[allow(dead_code)]
    pub fn set_favicon(&self, id: TabId, url: impl Into<FaviconUrl>) {
        if let Some(tab) = self.tabs.lock().unwrap().get_mut(&id) {
            tab.favicon_url = Some(url.into());
        }
    }

    #[allow(dead_code)]
    pub fn remove(&self, id: TabId) {
        self.tabs.lock().unwrap().remove(&id);
    }

    #[allow(dead_code)]
    pub fn snapshot(&self, id: TabId) -> Option<TabSnapshot> {
        self.tabs.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl TabHost for FakeTabHost {
    async fn query_tabs(&self, query: TabQuery) -> TabtoneResult<Vec<TabSnapshot>> {
        let tabs = self.tabs.lock().unwrap();
        let mut matched: Vec<TabSnapshot> = tabs
            .values()
            .filter(|tab| match query {
                TabQuery::All => true,
                TabQuery::Active => tab.active,
                TabQuery::Inactive => !tab.active,
            })
            .cloned()
            .collect();
        matched.sort_by_key(|tab| tab.id);
        Ok(matched)
    }

    async fn tab(&self, id: TabId) -> TabtoneResult<Option<TabSnapshot>> {
        Ok(self.tabs.lock().unwrap().get(&id).cloned())
    }
}

#[derive(Clone, Default)]
struct PageDom {
    has_link: bool,
    href: Option<FaviconUrl>,
    attr: Option<FaviconUrl>,
}

impl PageDom {
    fn with_link() -> Self {
        Self {
            has_link: true,
            ..Self::default()
        }
    }
}

/// Fake page scripting capability modelling one DOM per tab
///
/// Patches behave like the injected scripts would: an href patch only lands
/// when the page already carries an icon link, while persisting the original
/// creates the link when it is missing.
#[derive(Default)]
pub struct FakePages {
    pages: Mutex<HashMap<TabId, PageDom>>,
    failing: Mutex<HashSet<TabId>>,
    applied: Mutex<Vec<(TabId, IconPatch)>>,
    attr_reads: AtomicUsize,
}

impl FakePages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_href(&self, id: TabId) -> Option<FaviconUrl> {
        self.pages
            .lock()
            .unwrap()
            .get(&id)
            .and_then(|dom| dom.href.clone())
    }

    #[allow(dead_code)]
    pub fn stored_attr(&self, id: TabId) -> Option<FaviconUrl> {
        self.pages
            .lock()
            .unwrap()
            .get(&id)
            .and_then(|dom| dom.attr.clone())
    }

    /// Pre-populate a page as if a previous engine run had stamped it
    #[allow(dead_code)]
    pub fn seed_attr(&self, id: TabId, url: impl Into<FaviconUrl>) {
        let mut pages = self.pages.lock().unwrap();
        let dom = pages.entry(id).or_insert_with(PageDom::with_link);
        dom.attr = Some(url.into());
    }

    /// Pre-populate a page that carries no icon link at all
    #[allow(dead_code)]
    pub fn seed_linkless(&self, id: TabId) {
        self.pages.lock().unwrap().insert(id, PageDom::default());
    }

    #[allow(dead_code)]
    pub fn fail_tab(&self, id: TabId) {
        self.failing.lock().unwrap().insert(id);
    }

    #[allow(dead_code)]
    pub fn heal_tab(&self, id: TabId) {
        self.failing.lock().unwrap().remove(&id);
    }

    #[allow(dead_code)]
    pub fn applied(&self) -> Vec<(TabId, IconPatch)> {
        self.applied.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn attr_reads(&self) -> usize {
        self.attr_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageScripting for FakePages {
    async fn apply(&self, tab: TabId, patch: &IconPatch) -> TabtoneResult<()> {
        if self.failing.lock().unwrap().contains(&tab) {
            return Err(TabtoneError::injection(format!(
                "script injection into tab {tab} refused"
            )));
        }
        self.applied.lock().unwrap().push((tab, patch.clone()));

        let mut pages = self.pages.lock().unwrap();
        let dom = pages.entry(tab).or_insert_with(PageDom::with_link);
        if let Some(url) = &patch.saturated_original {
            if !dom.has_link {
                dom.has_link = true;
                dom.href = Some(url.clone());
            }
            dom.attr = Some(url.clone());
        }
        if let Some(url) = &patch.href {
            if dom.has_link {
                dom.href = Some(url.clone());
            }
        }
        Ok(())
    }

    async fn read_original_attr(&self, tab: TabId) -> TabtoneResult<Option<FaviconUrl>> {
        self.attr_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .pages
            .lock()
            .unwrap()
            .get(&tab)
            .and_then(|dom| dom.attr.clone()))
    }
}

/// Icon fetcher serving canned bytes and counting calls
#[derive(Default)]
pub struct FakeFetcher {
    icons: Mutex<HashMap<FaviconUrl, Vec<u8>>>,
    calls: AtomicUsize,
    delay: Mutex<Option<Duration>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: impl Into<FaviconUrl>, bytes: Vec<u8>) {
        self.icons.lock().unwrap().insert(url.into(), bytes);
    }

    #[allow(dead_code)]
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    #[allow(dead_code)]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IconFetcher for FakeFetcher {
    async fn fetch(&self, url: &FaviconUrl) -> TabtoneResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.icons
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| TabtoneError::fetch(format!("no canned icon for {url}")))
    }
}

/// Encode a solid-color PNG for use as a canned favicon
pub fn png_bytes(width: u32, height: u32, pixel: [u8; 4]) -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba(pixel));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("png encoding should not fail");
    bytes
}

/// Build a tab snapshot for a regular page
pub fn tab(id: u32, page: &str, favicon: &str) -> TabSnapshot {
    let mut snapshot = TabSnapshot::new(TabId(id));
    snapshot.page_url = Some(Url::parse(page).expect("test page URL should parse"));
    snapshot.favicon_url = Some(FaviconUrl::new(favicon));
    snapshot
}

/// Engine wired to fakes, with handles onto each of them
pub struct Harness {
    pub engine: Arc<TintEngine>,
    pub host: Arc<FakeTabHost>,
    pub pages: Arc<FakePages>,
    pub fetcher: Arc<FakeFetcher>,
}

impl Harness {
    /// Flip the host's active flags and deliver the activation event
    pub async fn activate(&self, id: TabId) -> TabtoneResult<()> {
        self.host.set_active(id);
        self.engine
            .handle_event(TabEvent::Activated { tab_id: id })
            .await
    }

    /// Deliver a favicon-changed event built from the host's current snapshot
    #[allow(dead_code)]
    pub async fn favicon_changed(&self, id: TabId) -> TabtoneResult<()> {
        let snapshot = self
            .host
            .snapshot(id)
            .expect("tab should exist in the fake host");
        let url = snapshot.favicon_url.clone();
        self.engine
            .handle_event(TabEvent::FaviconChanged {
                tab_id: id,
                url,
                snapshot,
            })
            .await
    }
}

pub fn build_harness() -> Harness {
    build_harness_with(EngineConfig::default())
}

pub fn build_harness_with(config: EngineConfig) -> Harness {
    let host = Arc::new(FakeTabHost::new());
    let pages = Arc::new(FakePages::new());
    let fetcher = Arc::new(FakeFetcher::new());
    let engine = TintEngine::builder()
        .with_config(config)
        .with_host(host.clone())
        .with_pages(pages.clone())
        .with_fetcher(fetcher.clone())
        .build()
        .expect("engine should build with fakes wired in");

    Harness {
        engine: Arc::new(engine),
        host,
        pages,
        fetcher,
    }
}

//! Simulated-browser example driving the tint engine end to end
//!
//! This example wires the engine to an in-memory browser with three tabs,
//! activates them in turn, and prints what every tab displays, so you can
//! watch inactive favicons go grey while the active tab keeps its color.
//!
//! Usage: cargo run --example simulated_tabs

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tabtone_engine::{
    FaviconUrl, IconFetcher, IconPatch, PageScripting, TabEvent, TabHost, TabId, TabQuery,
    TabSnapshot, TabtoneError, TabtoneResult, TintEngine,
};
use tokio::sync::{Mutex, mpsc};
use url::Url;

/// An in-memory browser: a tab list, one favicon link per page, and a
/// canned icon store standing in for the network.
struct SimulatedBrowser {
    tabs: Mutex<HashMap<TabId, TabSnapshot>>,
    hrefs: Mutex<HashMap<TabId, FaviconUrl>>,
    attrs: Mutex<HashMap<TabId, FaviconUrl>>,
    icons: HashMap<FaviconUrl, Vec<u8>>,
}

impl SimulatedBrowser {
    fn new(icons: HashMap<FaviconUrl, Vec<u8>>) -> Self {
        Self {
            tabs: Mutex::new(HashMap::new()),
            hrefs: Mutex::new(HashMap::new()),
            attrs: Mutex::new(HashMap::new()),
            icons,
        }
    }

    async fn open_tab(&self, id: TabId, page: &str, favicon: &FaviconUrl) {
        let mut snapshot = TabSnapshot::new(id);
        snapshot.page_url = Url::parse(page).ok();
        snapshot.favicon_url = Some(favicon.clone());
        self.tabs.lock().await.insert(id, snapshot);
        self.hrefs.lock().await.insert(id, favicon.clone());
    }

    async fn set_active(&self, id: TabId) {
        let mut tabs = self.tabs.lock().await;
        for (tab_id, snapshot) in tabs.iter_mut() {
            snapshot.active = *tab_id == id;
        }
    }

    async fn set_favicon(&self, id: TabId, favicon: &FaviconUrl) {
        if let Some(snapshot) = self.tabs.lock().await.get_mut(&id) {
            snapshot.favicon_url = Some(favicon.clone());
        }
    }

    async fn displayed(&self, id: TabId) -> Option<FaviconUrl> {
        self.hrefs.lock().await.get(&id).cloned()
    }
}

#[async_trait]
impl TabHost for SimulatedBrowser {
    async fn query_tabs(&self, query: TabQuery) -> TabtoneResult<Vec<TabSnapshot>> {
        let tabs = self.tabs.lock().await;
        let mut matching: Vec<TabSnapshot> = tabs
            .values()
            .filter(|tab| match query {
                TabQuery::All => true,
                TabQuery::Active => tab.active,
                TabQuery::Inactive => !tab.active,
            })
            .cloned()
            .collect();
        matching.sort_by_key(|tab| tab.id);
        Ok(matching)
    }

    async fn tab(&self, id: TabId) -> TabtoneResult<Option<TabSnapshot>> {
        Ok(self.tabs.lock().await.get(&id).cloned())
    }
}

#[async_trait]
impl PageScripting for SimulatedBrowser {
    async fn apply(&self, tab: TabId, patch: &IconPatch) -> TabtoneResult<()> {
        let mut hrefs = self.hrefs.lock().await;
        if let Some(original) = &patch.saturated_original {
            self.attrs.lock().await.insert(tab, original.clone());
            hrefs.entry(tab).or_insert_with(|| original.clone());
        }
        if let Some(href) = &patch.href {
            if let Some(current) = hrefs.get_mut(&tab) {
                *current = href.clone();
            }
        }
        Ok(())
    }

    async fn read_original_attr(&self, tab: TabId) -> TabtoneResult<Option<FaviconUrl>> {
        Ok(self.attrs.lock().await.get(&tab).cloned())
    }
}

#[async_trait]
impl IconFetcher for SimulatedBrowser {
    async fn fetch(&self, url: &FaviconUrl) -> TabtoneResult<Vec<u8>> {
        self.icons
            .get(url)
            .cloned()
            .ok_or_else(|| TabtoneError::fetch(format!("no canned icon for {url}")))
    }
}

fn png_bytes(pixel: [u8; 4]) -> Result<Vec<u8>, image::ImageError> {
    let img = image::RgbaImage::from_pixel(16, 16, image::Rgba(pixel));
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, image::ImageFormat::Png)?;
    Ok(cursor.into_inner())
}

fn shorten(url: &FaviconUrl) -> String {
    let s = url.as_str();
    if s.len() > 48 {
        format!("{}...", &s[..45])
    } else {
        s.to_string()
    }
}

async fn print_tabs(browser: &SimulatedBrowser) {
    for (label, id) in [("docs", TabId(1)), ("mail", TabId(2)), ("ci", TabId(3))] {
        let active = browser
            .tabs
            .lock()
            .await
            .get(&id)
            .is_some_and(|tab| tab.active);
        let marker = if active { "🟢 active  " } else { "⚪ inactive" };
        let href = match browser.displayed(id).await {
            Some(url) => shorten(&url),
            None => "(no icon link)".to_string(),
        };
        println!("   {} {:<5} {}", marker, label, href);
    }
    println!();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("🎨 Starting simulated tint engine example...");
    println!("   Three tabs with solid-color favicons; watch the inactive");
    println!("   ones turn into grey data URLs as activation moves around.");
    println!();

    let docs_icon = FaviconUrl::from("https://docs.example/favicon.ico");
    let mail_icon = FaviconUrl::from("https://mail.example/favicon.ico");
    let ci_icon = FaviconUrl::from("https://ci.example/favicon.ico");
    let ci_icon_v2 = FaviconUrl::from("https://ci.example/favicon-v2.ico");

    let mut icons = HashMap::new();
    icons.insert(docs_icon.clone(), png_bytes([66, 133, 244, 255])?);
    icons.insert(mail_icon.clone(), png_bytes([234, 67, 53, 255])?);
    icons.insert(ci_icon.clone(), png_bytes([52, 168, 83, 255])?);
    icons.insert(ci_icon_v2.clone(), png_bytes([0, 150, 136, 255])?);

    let browser = Arc::new(SimulatedBrowser::new(icons));
    browser.open_tab(TabId(1), "https://docs.example/", &docs_icon).await;
    browser.open_tab(TabId(2), "https://mail.example/", &mail_icon).await;
    browser.open_tab(TabId(3), "https://ci.example/", &ci_icon).await;
    browser.set_active(TabId(1)).await;

    let engine = Arc::new(
        TintEngine::builder()
            .with_host(browser.clone())
            .with_pages(browser.clone())
            .with_fetcher(browser.clone())
            .build()?,
    );

    let (tx, rx) = mpsc::unbounded_channel();
    let loop_handle = engine.clone().spawn_event_loop(rx);

    println!("🚀 Engine started; docs has focus:");
    tx.send(TabEvent::Started)?;
    tokio::time::sleep(Duration::from_millis(150)).await;
    print_tabs(&browser).await;

    println!("🖱️ Switching to mail:");
    browser.set_active(TabId(2)).await;
    tx.send(TabEvent::Activated { tab_id: TabId(2) })?;
    tokio::time::sleep(Duration::from_millis(150)).await;
    print_tabs(&browser).await;

    println!("🔁 ci deploys a new favicon while in the background:");
    browser.set_favicon(TabId(3), &ci_icon_v2).await;
    let snapshot = browser
        .tab(TabId(3))
        .await?
        .ok_or("ci tab disappeared")?;
    tx.send(TabEvent::FaviconChanged {
        tab_id: TabId(3),
        url: Some(ci_icon_v2.clone()),
        snapshot,
    })?;
    tokio::time::sleep(Duration::from_millis(150)).await;
    print_tabs(&browser).await;

    println!("🖱️ Switching to ci; its new icon comes back in color:");
    browser.set_active(TabId(3)).await;
    tx.send(TabEvent::Activated { tab_id: TabId(3) })?;
    tokio::time::sleep(Duration::from_millis(150)).await;
    print_tabs(&browser).await;

    let stats = engine.stats().await;
    println!("📊 Engine stats:");
    println!("   Tracked originals: {}", stats.tracked_tabs);
    println!(
        "   Cache entries: {} desaturated, {} saturated",
        stats.cache.desaturated_entries, stats.cache.saturated_entries
    );

    drop(tx);
    loop_handle.await?;

    println!("✨ Simulated tabs example completed!");
    Ok(())
}

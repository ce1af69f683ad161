//! In-page favicon agent
//!
//! Runs inside a page and mirrors its tab's focus state: losing focus swaps
//! the favicon for a desaturated copy, regaining focus restores the original.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use crate::dom::{EndpointFaviconSource, FaviconSource, IconDom};
use tabtone_core::{DEFAULT_TRANSFORM_TIMEOUT, FaviconUrl, PageConfig, TabtoneError, TabtoneResult};
use tabtone_engine::{HttpIconFetcher, IconFetcher, IconTransformer};

/// Focus transitions the host page reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEvent {
    Focus,
    Blur,
}

#[derive(Default)]
struct PageIcons {
    original: Option<FaviconUrl>,
    desaturated: Option<FaviconUrl>,
    backup: Option<FaviconUrl>,
}

/// Builder for creating PageAgent instances
pub struct PageAgentBuilder {
    config: Option<PageConfig>,
    dom: Option<Arc<dyn IconDom>>,
    fetcher: Option<Arc<dyn IconFetcher>>,
    source: Option<Arc<dyn FaviconSource>>,
    endpoint_base: Option<Url>,
    page_url: Option<Url>,
}

impl PageAgentBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            config: None,
            dom: None,
            fetcher: None,
            source: None,
            endpoint_base: None,
            page_url: None,
        }
    }

    /// Set the page configuration
    pub fn with_config(mut self, config: PageConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the icon DOM capability
    pub fn with_dom(mut self, dom: Arc<dyn IconDom>) -> Self {
        self.dom = Some(dom);
        self
    }

    /// Set the icon fetcher, replacing the default HTTP fetcher
    pub fn with_fetcher(mut self, fetcher: Arc<dyn IconFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Set the favicon source directly
    pub fn with_source(mut self, source: Arc<dyn FaviconSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Use the browser's favicon endpoint, rooted at `base`, as the source
    pub fn with_endpoint_base(mut self, base: Url) -> Self {
        self.endpoint_base = Some(base);
        self
    }

    /// Set the URL of the page this agent runs in
    pub fn with_page_url(mut self, page_url: Url) -> Self {
        self.page_url = Some(page_url);
        self
    }

    /// Build the PageAgent
    pub fn build(self) -> TabtoneResult<PageAgent> {
        let config = self.config.unwrap_or_default();
        let dom = self
            .dom
            .ok_or_else(|| TabtoneError::invalid_config("an icon DOM capability is required"))?;
        let page_url = self
            .page_url
            .ok_or_else(|| TabtoneError::invalid_config("a page URL is required"))?;
        let source = match (self.source, self.endpoint_base) {
            (Some(source), _) => source,
            (None, Some(base)) => Arc::new(EndpointFaviconSource::new(base, config.icon_size)),
            (None, None) => {
                return Err(TabtoneError::invalid_config(
                    "a favicon source or an endpoint base is required",
                ));
            }
        };
        let fetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpIconFetcher::new()?),
        };

        Ok(PageAgent {
            dom,
            transformer: IconTransformer::new(fetcher, DEFAULT_TRANSFORM_TIMEOUT),
            source,
            page_url,
            icons: Mutex::new(PageIcons::default()),
        })
    }
}

impl Default for PageAgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Swaps a single page's favicon between its original and a desaturated copy.
pub struct PageAgent {
    dom: Arc<dyn IconDom>,
    transformer: IconTransformer,
    source: Arc<dyn FaviconSource>,
    page_url: Url,
    icons: Mutex<PageIcons>,
}

impl PageAgent {
    /// Create a new builder for PageAgent
    pub fn builder() -> PageAgentBuilder {
        PageAgentBuilder::new()
    }

    /// Render and memoize this page's icon pair.
    ///
    /// The first call fetches the favicon and renders both variants; later
    /// calls return immediately.
    pub async fn seed(&self) -> TabtoneResult<()> {
        let mut icons = self.icons.lock().await;
        if icons.desaturated.is_some() {
            return Ok(());
        }

        let source_url = self.source.favicon_url(&self.page_url)?;
        let render = self.transformer.render(&source_url).await?;
        debug!("Seeded page icon pair from {}", source_url);
        icons.original = Some(render.original);
        icons.desaturated = Some(render.desaturated);
        Ok(())
    }

    /// Apply the favicon matching a focus transition.
    pub async fn handle(&self, event: PageEvent) -> TabtoneResult<()> {
        match event {
            PageEvent::Blur => self.on_blur().await,
            PageEvent::Focus => self.on_focus().await,
        }
    }

    async fn on_blur(&self) -> TabtoneResult<()> {
        self.seed().await?;
        let desaturated = self.icons.lock().await.desaturated.clone();
        self.set_favicon(desaturated.as_ref()).await
    }

    async fn on_focus(&self) -> TabtoneResult<()> {
        let target = {
            let icons = self.icons.lock().await;
            match (&icons.original, &icons.desaturated, &icons.backup) {
                // A page that serves its icon already grey renders to an
                // identical pair; restoring the render would change nothing,
                // so fall back to the href the page carried before the first
                // swap.
                (Some(original), Some(desaturated), Some(backup)) if original == desaturated => {
                    Some(backup.clone())
                }
                (original, _, _) => original.clone(),
            }
        };
        self.set_favicon(target.as_ref()).await
    }

    /// Point the page's icon links at `url`, creating a link when the page
    /// has none. The first swap captures the page's own href as a backup.
    async fn set_favicon(&self, url: Option<&FaviconUrl>) -> TabtoneResult<()> {
        let Some(url) = url else { return Ok(()) };

        let mut hrefs = self.dom.icon_hrefs().await?;
        if hrefs.is_empty() {
            self.dom.create_icon_link().await?;
            hrefs = self.dom.icon_hrefs().await?;
        }

        {
            let mut icons = self.icons.lock().await;
            if icons.backup.is_none() {
                icons.backup = hrefs.iter().rev().find(|href| !href.is_empty()).cloned();
            }
        }

        self.dom.set_all_hrefs(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeDom {
        hrefs: std::sync::Mutex<Vec<FaviconUrl>>,
        created: AtomicUsize,
    }

    impl FakeDom {
        fn with_hrefs(hrefs: Vec<&str>) -> Self {
            Self {
                hrefs: std::sync::Mutex::new(hrefs.into_iter().map(FaviconUrl::new).collect()),
                created: AtomicUsize::new(0),
            }
        }

        fn current(&self) -> Vec<FaviconUrl> {
            self.hrefs.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl IconDom for FakeDom {
        async fn icon_hrefs(&self) -> TabtoneResult<Vec<FaviconUrl>> {
            Ok(self.current())
        }

        async fn create_icon_link(&self) -> TabtoneResult<()> {
            self.created.fetch_add(1, Ordering::SeqCst);
            self.hrefs.lock().unwrap().push(FaviconUrl::new(""));
            Ok(())
        }

        async fn set_all_hrefs(&self, href: &FaviconUrl) -> TabtoneResult<()> {
            let mut hrefs = self.hrefs.lock().unwrap();
            for slot in hrefs.iter_mut() {
                *slot = href.clone();
            }
            Ok(())
        }
    }

    struct StaticSource {
        url: FaviconUrl,
    }

    impl FaviconSource for StaticSource {
        fn favicon_url(&self, _page_url: &Url) -> TabtoneResult<FaviconUrl> {
            Ok(self.url.clone())
        }
    }

    struct OneIconFetcher {
        bytes: Vec<u8>,
        calls: AtomicUsize,
    }

    impl OneIconFetcher {
        fn new(bytes: Vec<u8>) -> Self {
            Self {
                bytes,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl IconFetcher for OneIconFetcher {
        async fn fetch(&self, _url: &FaviconUrl) -> TabtoneResult<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.bytes.clone())
        }
    }

    fn png_bytes(pixel: [u8; 4]) -> Vec<u8> {
        let image = image::RgbaImage::from_pixel(4, 4, image::Rgba(pixel));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("png encoding should not fail");
        bytes
    }

    fn build_agent(dom: Arc<FakeDom>, fetcher: Arc<OneIconFetcher>) -> PageAgent {
        PageAgent::builder()
            .with_dom(dom)
            .with_fetcher(fetcher)
            .with_source(Arc::new(StaticSource {
                url: FaviconUrl::new("https://p.test/favicon.ico"),
            }))
            .with_page_url(Url::parse("https://p.test/").unwrap())
            .build()
            .expect("agent should build")
    }

    #[tokio::test]
    async fn build_requires_dom_page_url_and_source() {
        assert!(PageAgent::builder().build().is_err());

        let dom = Arc::new(FakeDom::with_hrefs(vec![]));
        assert!(
            PageAgent::builder()
                .with_dom(dom.clone())
                .with_page_url(Url::parse("https://p.test/").unwrap())
                .build()
                .is_err()
        );

        assert!(
            PageAgent::builder()
                .with_dom(dom)
                .with_page_url(Url::parse("https://p.test/").unwrap())
                .with_endpoint_base(Url::parse("chrome-extension://abcdefgh/").unwrap())
                .build()
                .is_ok()
        );
    }

    #[tokio::test]
    async fn blur_swaps_in_the_desaturated_icon_and_focus_restores() {
        let dom = Arc::new(FakeDom::with_hrefs(vec!["https://p.test/favicon.ico"]));
        let fetcher = Arc::new(OneIconFetcher::new(png_bytes([200, 30, 30, 255])));
        let agent = build_agent(dom.clone(), fetcher);

        agent.handle(PageEvent::Blur).await.unwrap();
        let blurred = dom.current();
        assert_eq!(blurred.len(), 1);
        assert!(blurred[0].as_str().starts_with("data:image/png;base64,"));

        agent.handle(PageEvent::Focus).await.unwrap();
        let focused = dom.current();
        assert!(focused[0].as_str().starts_with("data:image/png;base64,"));
        assert_ne!(focused[0], blurred[0]);
    }

    #[tokio::test]
    async fn grey_page_icon_falls_back_to_the_backup_on_focus() {
        let dom = Arc::new(FakeDom::with_hrefs(vec!["https://p.test/favicon.ico"]));
        let fetcher = Arc::new(OneIconFetcher::new(png_bytes([90, 90, 90, 255])));
        let agent = build_agent(dom.clone(), fetcher);

        agent.handle(PageEvent::Blur).await.unwrap();
        assert!(dom.current()[0].as_str().starts_with("data:image/png;base64,"));

        agent.handle(PageEvent::Focus).await.unwrap();
        assert_eq!(
            dom.current(),
            vec![FaviconUrl::new("https://p.test/favicon.ico")]
        );
    }

    #[tokio::test]
    async fn blur_creates_a_link_when_the_page_has_none() {
        let dom = Arc::new(FakeDom::with_hrefs(vec![]));
        let fetcher = Arc::new(OneIconFetcher::new(png_bytes([200, 30, 30, 255])));
        let agent = build_agent(dom.clone(), fetcher);

        agent.handle(PageEvent::Blur).await.unwrap();

        assert_eq!(dom.created.load(Ordering::SeqCst), 1);
        let hrefs = dom.current();
        assert_eq!(hrefs.len(), 1);
        assert!(hrefs[0].as_str().starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn seed_renders_only_once() {
        let dom = Arc::new(FakeDom::with_hrefs(vec!["https://p.test/favicon.ico"]));
        let fetcher = Arc::new(OneIconFetcher::new(png_bytes([200, 30, 30, 255])));
        let agent = build_agent(dom, fetcher.clone());

        agent.seed().await.unwrap();
        agent.seed().await.unwrap();
        agent.handle(PageEvent::Blur).await.unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn focus_before_any_blur_leaves_the_page_alone() {
        let dom = Arc::new(FakeDom::with_hrefs(vec!["https://p.test/favicon.ico"]));
        let fetcher = Arc::new(OneIconFetcher::new(png_bytes([200, 30, 30, 255])));
        let agent = build_agent(dom.clone(), fetcher.clone());

        agent.handle(PageEvent::Focus).await.unwrap();

        assert_eq!(
            dom.current(),
            vec![FaviconUrl::new("https://p.test/favicon.ico")]
        );
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }
}

//! DOM and favicon-lookup capabilities the page agent builds on

use async_trait::async_trait;
use url::Url;

use tabtone_core::{FaviconUrl, TabtoneError, TabtoneResult};

/// Access to the page's icon link elements.
#[async_trait]
pub trait IconDom: Send + Sync {
    /// Hrefs of every icon link in the document, in document order. A link
    /// without an href is reported as an empty URL.
    async fn icon_hrefs(&self) -> TabtoneResult<Vec<FaviconUrl>>;

    /// Append a bare icon link to the document head.
    async fn create_icon_link(&self) -> TabtoneResult<()>;

    /// Point every icon link at `href`.
    async fn set_all_hrefs(&self, href: &FaviconUrl) -> TabtoneResult<()>;
}

/// Where a page's favicon URL can be looked up from.
pub trait FaviconSource: Send + Sync {
    fn favicon_url(&self, page_url: &Url) -> TabtoneResult<FaviconUrl>;
}

/// Build the browser's favicon endpoint URL for `page_url`.
///
/// The endpoint serves the browser's own cached favicon for a page, scaled
/// to `size` pixels.
pub fn favicon_endpoint_url(base: &Url, page_url: &Url, size: u32) -> TabtoneResult<Url> {
    let mut url = base.join("/_favicon/").map_err(|e| {
        TabtoneError::invalid_config(format!("favicon endpoint base cannot be joined: {e}"))
    })?;
    url.query_pairs_mut()
        .append_pair("pageUrl", page_url.as_str())
        .append_pair("size", &size.to_string());
    Ok(url)
}

/// Favicon source backed by the browser's favicon endpoint.
pub struct EndpointFaviconSource {
    base: Url,
    size: u32,
}

impl EndpointFaviconSource {
    pub fn new(base: Url, size: u32) -> Self {
        Self { base, size }
    }
}

impl FaviconSource for EndpointFaviconSource {
    fn favicon_url(&self, page_url: &Url) -> TabtoneResult<FaviconUrl> {
        let url = favicon_endpoint_url(&self.base, page_url, self.size)?;
        Ok(FaviconUrl::new(url.as_str()))
    }
}

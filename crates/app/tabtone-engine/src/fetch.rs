use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use percent_encoding::percent_decode_str;

use crate::host::IconFetcher;
use tabtone_core::{FaviconUrl, TabtoneError, TabtoneResult};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches favicon bytes over HTTP with a shared client.
#[derive(Debug, Clone)]
pub struct HttpIconFetcher {
    client: reqwest::Client,
}

impl HttpIconFetcher {
    pub fn new() -> TabtoneResult<Self> {
        let client = reqwest::ClientBuilder::new()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| TabtoneError::fetch(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Wrap an existing client, keeping whatever policies it was built with.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IconFetcher for HttpIconFetcher {
    async fn fetch(&self, url: &FaviconUrl) -> TabtoneResult<Vec<u8>> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| TabtoneError::fetch(format!("Request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(TabtoneError::fetch(format!(
                "Request to {} returned status {}",
                url,
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TabtoneError::fetch(format!("Failed to read body from {}: {}", url, e)))?;

        Ok(bytes.to_vec())
    }
}

/// Decode the payload of a `data:` URL without touching the network.
///
/// Base64 payloads are decoded; anything else is percent-decoded, which
/// covers inline SVGs escaping `<`, `>`, and `#` color values.
pub fn decode_data_url(url: &FaviconUrl) -> TabtoneResult<Vec<u8>> {
    let raw = url.as_str();
    let (header, payload) = raw
        .split_once(',')
        .ok_or_else(|| TabtoneError::fetch("Data URL has no payload".to_string()))?;

    if header.ends_with(";base64") {
        Ok(BASE64_STANDARD.decode(payload)?)
    } else {
        Ok(percent_decode_str(payload).collect())
    }
}

//! Favicon image pipeline: fetch, decode, desaturate, re-encode.

use std::sync::Arc;
use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use image::{ImageBuffer, Rgba};
use resvg::render;
use tiny_skia::Pixmap;
use usvg::{Options, Tree};

use crate::fetch::decode_data_url;
use crate::host::IconFetcher;
use tabtone_core::{FaviconUrl, TabtoneError, TabtoneResult};

/// Rendered favicon pair produced by one transform pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconRender {
    /// Source pixels re-encoded as a PNG data URL.
    pub original: FaviconUrl,
    /// Grey rendition as a PNG data URL.
    pub desaturated: FaviconUrl,
}

/// Turns favicon URLs into rendered icon pairs.
pub struct IconTransformer {
    fetcher: Arc<dyn IconFetcher>,
    timeout: Duration,
}

impl IconTransformer {
    pub fn new(fetcher: Arc<dyn IconFetcher>, timeout: Duration) -> Self {
        Self { fetcher, timeout }
    }

    /// Fetch `url` and produce its original and desaturated renditions.
    ///
    /// Data URLs are decoded locally without touching the fetcher. The
    /// timeout bounds acquisition only; decode and encode run to completion
    /// once the bytes are in hand.
    pub async fn render(&self, url: &FaviconUrl) -> TabtoneResult<IconRender> {
        let bytes = if url.is_data_url() {
            decode_data_url(url)?
        } else {
            tokio::time::timeout(self.timeout, self.fetcher.fetch(url))
                .await
                .map_err(|_| TabtoneError::TransformTimeout(self.timeout))??
        };

        let mut image = decode_icon(url, &bytes)?;
        let original = rgba_to_data_url(&image)?;
        desaturate_rgba(&mut image);
        let desaturated = rgba_to_data_url(&image)?;

        Ok(IconRender {
            original,
            desaturated,
        })
    }
}

/// Convert an image to greyscale in place, preserving alpha.
pub fn desaturate_rgba(image: &mut image::RgbaImage) {
    for pixel in image.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        // Rec. 601 luma weights, rounded.
        let grey = (f32::from(r) * 0.3 + f32::from(g) * 0.59 + f32::from(b) * 0.11).round() as u8;
        *pixel = Rgba([grey, grey, grey, a]);
    }
}

/// Encode an RGBA image as a PNG data URL.
pub fn rgba_to_data_url(image: &image::RgbaImage) -> TabtoneResult<FaviconUrl> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);

    image.write_to(&mut cursor, image::ImageFormat::Png)?;

    let base64 = BASE64_STANDARD.encode(&buffer);
    Ok(FaviconUrl::from(format!("data:image/png;base64,{}", base64)))
}

fn decode_icon(url: &FaviconUrl, bytes: &[u8]) -> TabtoneResult<image::RgbaImage> {
    if looks_like_svg(url, bytes) {
        render_svg_bytes(bytes)
    } else {
        Ok(image::load_from_memory(bytes)?.to_rgba8())
    }
}

fn looks_like_svg(url: &FaviconUrl, bytes: &[u8]) -> bool {
    if url.as_str().starts_with("data:image/svg+xml") {
        return true;
    }
    let head = bytes.get(..256).unwrap_or(bytes);
    let text = String::from_utf8_lossy(head);
    let trimmed = text.trim_start();
    trimmed.starts_with("<svg") || trimmed.starts_with("<?xml")
}

/// Rasterize SVG bytes, scaling small graphics up to a favicon-friendly size.
pub fn render_svg_bytes(svg_bytes: &[u8]) -> TabtoneResult<image::RgbaImage> {
    let mut opt = Options::default();
    opt.fontdb_mut().load_system_fonts();

    let tree = Tree::from_data(svg_bytes, &opt)
        .map_err(|e| TabtoneError::svg(format!("Failed to parse SVG: {}", e)))?;

    let size = tree.size();
    let target = 64.0_f32;
    let scale = (target / size.width().max(size.height())).max(1.0);
    let width = (size.width() * scale).ceil() as u32;
    let height = (size.height() * scale).ceil() as u32;

    let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
        TabtoneError::svg(format!(
            "Failed to create pixmap with dimensions {}x{}",
            width, height
        ))
    })?;

    render(
        &tree,
        tiny_skia::Transform::from_scale(scale, scale),
        &mut pixmap.as_mut(),
    );

    let img = ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, pixmap.data().to_vec())
        .ok_or_else(|| {
            TabtoneError::svg(format!(
                "Failed to create image buffer from pixmap data ({}x{})",
                width, height
            ))
        })?;

    Ok(img)
}

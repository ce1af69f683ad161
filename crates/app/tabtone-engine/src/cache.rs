use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

use crate::transform::IconTransformer;
use tabtone_core::{FaviconUrl, TabtoneError, TabtoneResult};

/// Transform cache keyed by favicon URL.
///
/// Both maps are write-through views of the same transform: `desaturated`
/// resolves any URL the pipeline has seen to its grey rendition (generated
/// data URLs map to themselves), `saturated` resolves back to the source URL.
/// Concurrent requests for the same source share one in-flight transform.
#[derive(Default)]
pub struct FaviconCache {
    entries: Mutex<CacheEntries>,
    in_flight: DashMap<FaviconUrl, Arc<OnceCell<FaviconUrl>>>,
}

#[derive(Default)]
struct CacheEntries {
    desaturated: HashMap<FaviconUrl, FaviconUrl>,
    saturated: HashMap<FaviconUrl, FaviconUrl>,
}

/// Counters exposed for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub desaturated_entries: usize,
    pub saturated_entries: usize,
    pub in_flight: usize,
}

impl FaviconCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `source` to its desaturated rendition, rendering it through
    /// `transformer` on a miss.
    pub async fn get_desaturated(
        &self,
        source: &FaviconUrl,
        transformer: &IconTransformer,
    ) -> TabtoneResult<FaviconUrl> {
        if let Some(hit) = self.lookup_desaturated(source).await {
            return Ok(hit);
        }

        let cell = self
            .in_flight
            .entry(source.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let result = cell
            .get_or_try_init(|| async {
                debug!("Favicon cache miss; rendering desaturated icon");
                let render = transformer.render(source).await?;
                self.store(source, &render.desaturated).await;
                Ok::<_, TabtoneError>(render.desaturated)
            })
            .await
            .cloned();

        self.in_flight.remove(source);
        result
    }

    /// The source URL a rendition was generated from, if this cache did the
    /// generating. Source URLs resolve to themselves.
    pub async fn saturated_for(&self, url: &FaviconUrl) -> Option<FaviconUrl> {
        let entries = self.entries.lock().await;
        entries.saturated.get(url).cloned()
    }

    /// Whether the transform pipeline has seen `url`, either as a source or
    /// as generated output.
    pub async fn has_seen(&self, url: &FaviconUrl) -> bool {
        let entries = self.entries.lock().await;
        entries.desaturated.contains_key(url)
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().await;
        CacheStats {
            desaturated_entries: entries.desaturated.len(),
            saturated_entries: entries.saturated.len(),
            in_flight: self.in_flight.len(),
        }
    }

    async fn lookup_desaturated(&self, source: &FaviconUrl) -> Option<FaviconUrl> {
        let entries = self.entries.lock().await;
        entries.desaturated.get(source).cloned()
    }

    async fn store(&self, source: &FaviconUrl, generated: &FaviconUrl) {
        let mut entries = self.entries.lock().await;
        entries
            .desaturated
            .insert(source.clone(), generated.clone());
        entries
            .desaturated
            .insert(generated.clone(), generated.clone());

        // A source that is already grey renders to itself; recording it as
        // its own saturated form would hide the real original.
        if source != generated {
            entries.saturated.insert(source.clone(), source.clone());
            entries.saturated.insert(generated.clone(), source.clone());
        }
    }
}

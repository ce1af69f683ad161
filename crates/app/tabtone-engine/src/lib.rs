// Re-export main types for easy access
pub use applicator::IconApplicator;
pub use cache::{CacheStats, FaviconCache};
pub use engine::{EngineStats, TintEngine, TintEngineBuilder};
pub use fetch::{HttpIconFetcher, decode_data_url};
pub use host::{IconFetcher, PageScripting, TabEvent, TabHost, TabQuery};
// Re-export core types for convenience
pub use tabtone_core::{
    EngineConfig, FaviconUrl, IconPatch, PlaceholderPolicy, SATURATED_ORIGINAL_ATTR, TabId,
    TabSnapshot, TabtoneError, TabtoneResult,
};
pub use tracker::{RecordOutcome, TabStateTracker};
pub use transform::{
    IconRender, IconTransformer, desaturate_rgba, render_svg_bytes, rgba_to_data_url,
};

// Internal modules
mod applicator;
mod cache;
mod engine;
mod fetch;
mod host;
mod tracker;
mod transform;

// Re-export main types for easy access
pub use agent::{PageAgent, PageAgentBuilder, PageEvent};
pub use dom::{EndpointFaviconSource, FaviconSource, IconDom, favicon_endpoint_url};
// Re-export core types for convenience
pub use tabtone_core::{
    DEFAULT_ICON_SIZE, FaviconUrl, PageConfig, TabtoneError, TabtoneResult,
};

// Internal modules
mod agent;
mod dom;

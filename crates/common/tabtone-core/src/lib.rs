mod config;
mod error;
mod types;

pub use config::{
    DEFAULT_ICON_SIZE, DEFAULT_TRANSFORM_TIMEOUT, EngineConfig, PageConfig, PlaceholderPolicy,
};
pub use error::{TabtoneError, TabtoneResult};
pub use types::{FaviconUrl, IconPatch, SATURATED_ORIGINAL_ATTR, TabId, TabSnapshot};

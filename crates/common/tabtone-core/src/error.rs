use std::time::Duration;
use thiserror::Error;

use crate::TabId;

#[derive(Debug, Error)]
pub enum TabtoneError {
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Data URL decode error: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("SVG render error: {0}")]
    Svg(String),

    #[error("Icon fetch error: {0}")]
    Fetch(String),

    #[error("Transform timed out after {0:?}")]
    TransformTimeout(Duration),

    #[error("Script injection error: {0}")]
    Injection(String),

    #[error("Tab {0} not found")]
    TabNotFound(TabId),

    #[error("Host error: {0}")]
    Host(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TabtoneError {
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    pub fn svg(msg: impl Into<String>) -> Self {
        Self::Svg(msg.into())
    }

    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    pub fn injection(msg: impl Into<String>) -> Self {
        Self::Injection(msg.into())
    }

    pub fn host(msg: impl Into<String>) -> Self {
        Self::Host(msg.into())
    }
}

pub type TabtoneResult<T> = std::result::Result<T, TabtoneError>;

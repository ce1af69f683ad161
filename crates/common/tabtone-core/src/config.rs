use bon::bon;
use url::Url;

use crate::{FaviconUrl, TabtoneError, TabtoneResult};
use std::time::Duration;

pub const DEFAULT_TRANSFORM_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_ICON_SIZE: u32 = 32;

fn validate_transform_timeout(timeout: Duration) -> TabtoneResult<Duration> {
    if timeout.is_zero() {
        return Err(TabtoneError::InvalidConfig {
            reason: "transform timeout cannot be zero".into(),
        });
    }
    if timeout > Duration::from_secs(60) {
        return Err(TabtoneError::InvalidConfig {
            reason: "transform timeout cannot be greater than 60 seconds".into(),
        });
    }
    Ok(timeout)
}

fn validate_internal_schemes(schemes: Vec<String>) -> TabtoneResult<Vec<String>> {
    if schemes.is_empty() {
        return Err(TabtoneError::InvalidConfig {
            reason: "internal scheme list cannot be empty".into(),
        });
    }
    for scheme in &schemes {
        if !scheme.ends_with(':') {
            return Err(TabtoneError::InvalidConfig {
                reason: format!("internal scheme '{scheme}' must end with ':'"),
            });
        }
    }
    Ok(schemes)
}

fn validate_icon_size(size: u32) -> TabtoneResult<u32> {
    if size == 0 {
        return Err(TabtoneError::InvalidConfig {
            reason: "icon size cannot be zero".into(),
        });
    }
    if size > 512 {
        return Err(TabtoneError::InvalidConfig {
            reason: "icon size cannot be greater than 512 pixels".into(),
        });
    }
    Ok(size)
}

fn default_internal_schemes() -> Vec<String> {
    [
        "chrome:",
        "chrome-extension:",
        "edge:",
        "about:",
        "devtools:",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// The stand-in icon some browsers report for pages that never declared one.
///
/// Chromium falls back to Google's own favicon URL for such pages, so a tab
/// can report that URL without the page having anything to do with Google.
/// The policy treats the URL as a placeholder unless the page itself lives on
/// the owning domain.
#[derive(Debug, Clone)]
pub struct PlaceholderPolicy {
    pub url: FaviconUrl,
    pub owning_domain: String,
}

impl Default for PlaceholderPolicy {
    fn default() -> Self {
        Self {
            url: FaviconUrl::new("https://www.google.com/favicon.ico"),
            owning_domain: "google.com".into(),
        }
    }
}

impl PlaceholderPolicy {
    #[must_use]
    pub fn matches(&self, url: &FaviconUrl) -> bool {
        *url == self.url
    }

    /// Whether `page_url` belongs to the domain that legitimately serves the
    /// placeholder URL as its real favicon.
    #[must_use]
    pub fn owns_page(&self, page_url: &Url) -> bool {
        match page_url.host_str() {
            Some(host) => {
                host == self.owning_domain
                    || host.ends_with(&format!(".{}", self.owning_domain))
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub internal_schemes: Vec<String>,
    pub placeholder: PlaceholderPolicy,
    pub transform_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            internal_schemes: default_internal_schemes(),
            placeholder: PlaceholderPolicy::default(),
            transform_timeout: DEFAULT_TRANSFORM_TIMEOUT,
        }
    }
}

#[bon]
impl EngineConfig {
    /// Creates a new engine configuration using the builder pattern.
    ///
    /// # Example
    ///
    /// ```
    /// use tabtone_core::EngineConfig;
    /// use std::time::Duration;
    ///
    /// // Default config (browser-internal schemes skipped, 10 second timeout)
    /// let config = EngineConfig::builder().build();
    ///
    /// // Shorter transform timeout
    /// let config = EngineConfig::builder()
    ///     .transform_timeout(Duration::from_secs(2))
    ///     .unwrap()
    ///     .build();
    /// ```
    #[builder]
    pub fn new(
        #[builder(
            default = default_internal_schemes(),
            with = |schemes: Vec<String>| -> Result<_, TabtoneError> {
                validate_internal_schemes(schemes)
            },
        )]
        internal_schemes: Vec<String>,

        #[builder(default)] placeholder: PlaceholderPolicy,

        #[builder(
            default = DEFAULT_TRANSFORM_TIMEOUT,
            with = |timeout: Duration| -> Result<_, TabtoneError> {
                validate_transform_timeout(timeout)
            },
        )]
        transform_timeout: Duration,
    ) -> Self {
        Self {
            internal_schemes,
            placeholder,
            transform_timeout,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageConfig {
    pub icon_size: u32,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            icon_size: DEFAULT_ICON_SIZE,
        }
    }
}

#[bon]
impl PageConfig {
    /// Creates a new page configuration using the builder pattern.
    ///
    /// # Example
    ///
    /// ```
    /// use tabtone_core::PageConfig;
    ///
    /// let config = PageConfig::builder()
    ///     .icon_size(64)
    ///     .unwrap()
    ///     .build();
    /// ```
    #[builder]
    pub fn new(
        #[builder(
            default = DEFAULT_ICON_SIZE,
            with = |size: u32| -> Result<_, TabtoneError> {
                validate_icon_size(size)
            },
        )]
        icon_size: u32,
    ) -> Self {
        Self { icon_size }
    }
}

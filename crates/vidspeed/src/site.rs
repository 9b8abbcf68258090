//! Supported-site classification for the control panel

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// How the panel labels the active tab's site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SiteStatus {
    /// Hostname matches the allow-list
    Supported,
    /// Any other page; the controller still works on plain media elements
    Generic,
    /// No active tab
    Unavailable,
    /// The tab URL could not be parsed
    DetectionFailed,
}

impl SiteStatus {
    /// Label shown in the panel
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Supported => "Supported site",
            Self::Generic => "Generic mode",
            Self::Unavailable => "Tab unavailable",
            Self::DetectionFailed => "Detection failed",
        }
    }
}

impl fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Allow-list of site fragments matched against hostnames
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteCatalog {
    sites: Vec<String>,
}

impl SiteCatalog {
    /// Catalog over `sites`
    pub fn new<I, S>(sites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sites: sites.into_iter().map(Into::into).collect(),
        }
    }

    /// Entries in order
    #[must_use]
    pub fn sites(&self) -> &[String] {
        &self.sites
    }

    /// Classify a tab URL
    ///
    /// A URL without a host (`about:blank`, `data:`) is generic.
    #[must_use]
    pub fn classify(&self, tab_url: &str) -> SiteStatus {
        let Ok(parsed) = Url::parse(tab_url) else {
            return SiteStatus::DetectionFailed;
        };
        let host = parsed.host_str().unwrap_or_default();
        if self.sites.iter().any(|site| host.contains(site.as_str())) {
            SiteStatus::Supported
        } else {
            SiteStatus::Generic
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SUPPORTED_SITES;

    fn catalog() -> SiteCatalog {
        SiteCatalog::new(DEFAULT_SUPPORTED_SITES)
    }

    #[test]
    fn test_supported_hosts() {
        assert_eq!(
            catalog().classify("https://www.bilibili.com/video/BV1xx"),
            SiteStatus::Supported
        );
        assert_eq!(catalog().classify("https://v.qq.com/x/cover"), SiteStatus::Supported);
    }

    #[test]
    fn test_substring_match_only_looks_at_host() {
        assert_eq!(
            catalog().classify("https://example.org/youtube.com"),
            SiteStatus::Generic
        );
    }

    #[test]
    fn test_unparsable_and_hostless() {
        assert_eq!(catalog().classify("not a url"), SiteStatus::DetectionFailed);
        assert_eq!(catalog().classify("about:blank"), SiteStatus::Generic);
    }
}

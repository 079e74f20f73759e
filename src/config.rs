//! Runtime configuration.
//!
//! Two knobs: the identity backend's base URL and the directory used for
//! durable token storage. Both can come from the environment or be supplied
//! explicitly by the embedding application.

use std::path::PathBuf;

use anyhow::Result;

/// Application name used for the default storage directory path
const APP_NAME: &str = "authgate";

/// Environment variable overriding the backend base URL
const API_URL_ENV: &str = "AUTHGATE_API_URL";

/// Default backend address when no override is present
const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub storage_dir: PathBuf,
}

impl Config {
    /// Build a config with an explicit base URL and storage directory.
    pub fn new(base_url: impl Into<String>, storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: normalize_base_url(base_url.into()),
            storage_dir: storage_dir.into(),
        }
    }

    /// Build a config from the environment, falling back to
    /// `http://localhost:8000` and the platform config directory.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var(API_URL_ENV).unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;

        Ok(Self {
            base_url: normalize_base_url(base_url),
            storage_dir: config_dir.join(APP_NAME),
        })
    }
}

/// Strip trailing slashes so endpoint paths (which start with `/`) join cleanly.
fn normalize_base_url(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_normalized() {
        let config = Config::new("http://localhost:8000/", "/tmp/authgate-test");
        assert_eq!(config.base_url, "http://localhost:8000");

        let config = Config::new("http://localhost:8000", "/tmp/authgate-test");
        assert_eq!(config.base_url, "http://localhost:8000");
    }
}

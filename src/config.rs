//! Runtime configuration.
//!
//! The backend base URL is the only value taken from the environment.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::error::ConfigError;

/// Environment variable holding the backend base URL.
pub const BACKEND_URL_VAR: &str = "BACKEND_URL";

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:3001";

/// Delay between a successful login and the redirect.
pub const REDIRECT_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminConfig {
    pub backend_url: String,
    pub token_path: PathBuf,
    pub redirect_delay: Duration,
}

impl AdminConfig {
    pub fn new(backend_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            backend_url: normalize_backend_url(backend_url)?,
            token_path: default_token_path(),
            redirect_delay: REDIRECT_DELAY,
        })
    }

    /// Read `BACKEND_URL`, falling back to the local development backend.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(BACKEND_URL_VAR) {
            Ok(url) if !url.trim().is_empty() => Self::new(&url),
            _ => {
                warn!(
                    "{} not set, using {}",
                    BACKEND_URL_VAR, DEFAULT_BACKEND_URL
                );
                Self::new(DEFAULT_BACKEND_URL)
            }
        }
    }

    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }
}

fn normalize_backend_url(raw: &str) -> Result<String, ConfigError> {
    let url = raw.trim().trim_end_matches('/');
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::InvalidBackendUrl(raw.to_string()));
    }
    Ok(url.to_string())
}

/// `~/.easyappoint/session.json`, or the working directory when there is no
/// home directory.
pub fn default_token_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".easyappoint"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("session.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_are_trimmed() {
        let config = AdminConfig::new("https://api.clinic.test/api/").unwrap();
        assert_eq!(config.backend_url, "https://api.clinic.test/api");
    }

    #[test]
    fn non_http_urls_are_rejected() {
        assert_eq!(
            AdminConfig::new("ftp://clinic"),
            Err(ConfigError::InvalidBackendUrl("ftp://clinic".to_string()))
        );
    }

    #[test]
    fn redirect_delay_is_three_seconds() {
        let config = AdminConfig::new(DEFAULT_BACKEND_URL).unwrap();
        assert_eq!(config.redirect_delay, Duration::from_millis(3000));
    }

    #[test]
    fn token_path_can_be_overridden() {
        let config = AdminConfig::new(DEFAULT_BACKEND_URL)
            .unwrap()
            .with_token_path("/tmp/session.json");
        assert_eq!(config.token_path, PathBuf::from("/tmp/session.json"));
        assert!(default_token_path().ends_with("session.json"));
    }
}

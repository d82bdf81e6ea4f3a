//! Client configuration.
//!
//! Built once by the integrating application and handed to
//! [`CloudClient::new`](crate::api::client::CloudClient::new). There is no
//! process-wide default: a client cannot exist without a configuration.

use std::time::Duration;

use reqwest::Url;

use crate::error::ApiError;

/// Default request timeout (seconds), matching common platform defaults.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Connect timeout for SSE streams. The stream itself has no read timeout.
pub const SSE_CONNECT_TIMEOUT: Duration = Duration::from_secs(90);

/// Path prefix for versioned REST endpoints.
pub const API_VERSION_PREFIX: &str = "/api/v1";

#[derive(Debug, Clone)]
pub struct Configuration {
    /// Backend root, e.g. `https://theraforge.example.org`.
    pub base_url: Url,
    /// Sent on every request as the `API-KEY` header.
    pub api_key: String,
    /// Timeout applied by the transport to ordinary (non-SSE) calls.
    pub request_timeout: Duration,
    /// Pin both minimum and maximum TLS version to 1.3.
    pub pin_tls13: bool,
}

impl Configuration {
    pub fn new(base_url: Url, api_key: impl Into<String>) -> Self {
        Self {
            base_url,
            api_key: api_key.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            pin_tls13: true,
        }
    }

    /// Parse a base URL string. Trailing slashes are dropped so endpoint
    /// paths can be appended verbatim.
    pub fn parse(base_url: &str, api_key: impl Into<String>) -> Result<Self, ApiError> {
        let trimmed = base_url.trim_end_matches('/');
        let url = Url::parse(trimmed).map_err(|e| ApiError::invalid_request(&e.to_string()))?;
        Ok(Self::new(url, api_key))
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_tls13_pin(mut self, pin: bool) -> Self {
        self.pin_tls13 = pin;
        self
    }

    /// Load from `THERAFORGE_API_URL`, `THERAFORGE_API_KEY` and optionally
    /// `THERAFORGE_REQUEST_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ApiError> {
        let url = std::env::var("THERAFORGE_API_URL")
            .map_err(|_| ApiError::invalid_request("THERAFORGE_API_URL is not set"))?;
        let key = std::env::var("THERAFORGE_API_KEY")
            .map_err(|_| ApiError::invalid_request("THERAFORGE_API_KEY is not set"))?;

        let mut config = Self::parse(&url, key)?;
        if let Ok(secs) = std::env::var("THERAFORGE_REQUEST_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(secs) => config.request_timeout = Duration::from_secs(secs),
                Err(_) => log::warn!(
                    "Ignoring invalid THERAFORGE_REQUEST_TIMEOUT_SECS={:?}",
                    secs
                ),
            }
        }
        Ok(config)
    }

    /// Absolute URL string for a path. `versioned` selects the `/api/v1`
    /// prefix; the change-feed SSE endpoint lives outside it.
    pub fn url_for(&self, path: &str, versioned: bool) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        if versioned {
            format!("{}{}{}", base, API_VERSION_PREFIX, path)
        } else {
            format!("{}{}", base, path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Configuration::parse("https://api.example.org/", "key").unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert!(config.pin_tls13);
        assert_eq!(config.api_key, "key");
    }

    #[test]
    fn test_url_for() {
        let config = Configuration::parse("https://api.example.org/", "key").unwrap();
        assert_eq!(
            config.url_for("/auth/login", true),
            "https://api.example.org/api/v1/auth/login"
        );
        assert_eq!(
            config.url_for("/sse-changes", false),
            "https://api.example.org/sse-changes"
        );
    }

    #[test]
    fn test_invalid_url_rejected() {
        let err = Configuration::parse("not a url", "key").unwrap_err();
        assert_eq!(err.status_code, Some(400));
    }
}

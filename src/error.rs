//! Error types for the TheraForge client.
//!
//! Every public operation fails with [`ApiError`], the single
//! `{statusCode, name, message, code}` shape the backend also uses for its
//! 4xx payloads. Transport and secret-store failures have their own enums
//! internally and are normalized into `ApiError` before reaching callers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Uniform error returned on every failure path.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct ApiError {
    pub status_code: Option<i64>,
    pub name: Option<String>,
    pub message: String,
    pub code: Option<String>,
}

impl ApiError {
    pub fn new(status_code: Option<i64>, name: Option<&str>, message: &str) -> Self {
        Self {
            status_code,
            name: name.map(str::to_string),
            message: message.to_string(),
            code: None,
        }
    }

    /// Success status but no body to decode.
    pub fn empty() -> Self {
        Self::new(Some(500), Some("Empty"), "There is no data in the response")
    }

    /// The transport produced no HTTP response at all.
    pub fn unknown() -> Self {
        Self::new(Some(500), Some("Unknown"), "Something went wrong...")
    }

    /// 5xx or any status outside the handled ranges.
    pub fn unknown_error_code() -> Self {
        Self::new(
            Some(500),
            Some("Unknown Error Code"),
            "Something went wrong...",
        )
    }

    /// Authentication required but no token in cache or store.
    pub fn missing_credential() -> Self {
        Self::new(
            Some(403),
            Some("Missing Credential"),
            "There is no credential for a request that requires authentication",
        )
    }

    /// Multipart body lacks the attachment or metadata segment.
    pub fn corrupt_data() -> Self {
        Self::new(Some(403), Some("Not found"), "Data is corrupt.")
    }

    pub fn boundary_not_found() -> Self {
        Self::new(Some(403), Some("Not found"), "Boundary value not found")
    }

    pub fn invalid_request(detail: &str) -> Self {
        Self::new(
            Some(400),
            Some("Invalid Request"),
            &format!("Invalid URL request: {}", detail),
        )
    }

    fn is_named(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name)
    }

    pub fn is_missing_credential(&self) -> bool {
        self.is_named("Missing Credential")
    }

    pub fn is_unknown_error_code(&self) -> bool {
        self.is_named("Unknown Error Code")
    }
}

/// Failure reported by a [`Transport`](crate::api::transport::Transport)
/// before any HTTP status was received.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),

    /// The exchange finished without an HTTP response (e.g. redirect loop).
    #[error("No HTTP response received")]
    NoResponse,
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::NoResponse => ApiError::unknown(),
            TransportError::InvalidUrl(url) => ApiError::invalid_request(&url),
            TransportError::Request(e) => {
                let status = e.status().map(|s| i64::from(s.as_u16()));
                let name = if e.is_timeout() {
                    "Timeout"
                } else if e.is_connect() {
                    "Connection"
                } else {
                    "Transport"
                };
                ApiError::new(status, Some(name), &e.to_string())
            }
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::new(None, Some("Decoding"), &err.to_string())
    }
}

/// Secret store failure (keychain unavailable, bad encoding, ...).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Secret store operation failed: {0}")]
    OperationFailed(String),

    #[error("Stored value for `{key}` is not valid JSON: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(feature = "keychain")]
impl From<keyring::Error> for StoreError {
    fn from(err: keyring::Error) -> Self {
        StoreError::OperationFailed(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::new(None, Some("Secret Store"), &err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_payload_decodes_into_api_error() {
        let json = r#"{"statusCode":403,"name":"x","message":"bad","code":null}"#;
        let err: ApiError = serde_json::from_str(json).unwrap();
        assert_eq!(err.status_code, Some(403));
        assert_eq!(err.name.as_deref(), Some("x"));
        assert_eq!(err.message, "bad");
        assert!(err.code.is_none());
        assert_eq!(err.to_string(), "bad");
    }

    #[test]
    fn test_payload_without_optional_fields() {
        let err: ApiError = serde_json::from_str(r#"{"message":"nope"}"#).unwrap();
        assert_eq!(err.message, "nope");
        assert!(err.status_code.is_none());
        assert!(err.name.is_none());
    }

    #[test]
    fn test_canonical_errors() {
        assert!(ApiError::missing_credential().is_missing_credential());
        assert_eq!(ApiError::missing_credential().status_code, Some(403));
        assert!(ApiError::unknown_error_code().is_unknown_error_code());
        assert!(!ApiError::unknown().is_unknown_error_code());
        assert_eq!(ApiError::corrupt_data().message, "Data is corrupt.");
    }

    #[test]
    fn test_no_response_maps_to_unknown() {
        let err: ApiError = TransportError::NoResponse.into();
        assert_eq!(err, ApiError::unknown());
    }
}

//! Access/refresh token pair issued by the auth endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Bearer token, refresh token and expiry as returned in `accessToken`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    pub token: String,
    pub refresh_token: String,
    #[zeroize(skip)]
    pub expires_at: DateTime<Utc>,
}

impl AuthToken {
    pub fn new(
        token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token: token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
        }
    }

    /// True iff the current time is strictly before `expires_at`.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// No leeway: the expiry instant itself is already invalid.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

// Tokens stay out of logs.
impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token_expiring(at: DateTime<Utc>) -> AuthToken {
        AuthToken::new("access", "refresh", at)
    }

    #[test]
    fn test_valid_before_expiry() {
        let now = Utc::now();
        let token = token_expiring(now + Duration::seconds(1));
        assert!(token.is_valid_at(now));
    }

    #[test]
    fn test_invalid_at_exact_expiry() {
        let now = Utc::now();
        let token = token_expiring(now);
        assert!(!token.is_valid_at(now));
    }

    #[test]
    fn test_invalid_after_expiry() {
        let now = Utc::now();
        let token = token_expiring(now - Duration::milliseconds(1));
        assert!(!token.is_valid_at(now));
        assert!(!token.is_valid());
    }

    #[test]
    fn test_wire_format() {
        let json = r#"{"token":"abc","refreshToken":"def","expiresAt":"2030-01-01T00:00:00Z"}"#;
        let token: AuthToken = serde_json::from_str(json).unwrap();
        assert_eq!(token.token, "abc");
        assert_eq!(token.refresh_token, "def");
        assert_eq!(token.bearer(), "Bearer abc");

        let back = serde_json::to_string(&token).unwrap();
        assert!(back.contains("\"refreshToken\":\"def\""));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let token = token_expiring(Utc::now());
        let printed = format!("{:?}", token);
        assert!(!printed.contains("access"));
        assert!(printed.contains("<redacted>"));
    }
}

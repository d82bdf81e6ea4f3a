//! Endpoint catalogue and request construction.
//!
//! A [`RequestDescriptor`] says *what* to call; [`RequestDescriptor::build`]
//! turns it into an [`HttpRequest`] with the backend's header conventions.
//! The bearer token is not added here: the pipeline attaches it after the
//! validity check so a refreshed token is the one that goes out.

use serde::Serialize;

use super::transport::{HttpRequest, Method};
use crate::config::Configuration;
use crate::error::ApiError;

/// Backend endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Login,
    SignUp,
    SocialLogin,
    Logout,
    ChangePassword,
    ForgotPassword,
    ResetPassword,
    RefreshToken,
    DeleteAccount { user_id: String },
    ProfileUpload { user_id: String, location: String },
    Files,
    FileInfo,
    FileRevision,
    FileRename,
    SseSubscribe,
    SseChanges,
}

impl Endpoint {
    /// Path relative to the API root, including any query string.
    pub fn path(&self) -> String {
        match self {
            Endpoint::Login => "/auth/login".to_string(),
            Endpoint::SignUp => "/auth/signup".to_string(),
            Endpoint::SocialLogin => "/auth/social-login".to_string(),
            Endpoint::Logout => "/auth/logout".to_string(),
            Endpoint::ChangePassword => "/auth/change-password".to_string(),
            Endpoint::ForgotPassword => "/auth/forgot-password".to_string(),
            Endpoint::ResetPassword => "/auth/reset-password".to_string(),
            Endpoint::RefreshToken => "/auth/refresh-token".to_string(),
            Endpoint::DeleteAccount { user_id } => {
                format!("/user/{}", urlencoding::encode(user_id))
            }
            Endpoint::ProfileUpload { user_id, location } => format!(
                "/upload/{}?type={}",
                urlencoding::encode(user_id),
                urlencoding::encode(location)
            ),
            Endpoint::Files => "/files".to_string(),
            Endpoint::FileInfo => "/files/info".to_string(),
            Endpoint::FileRevision => "/files/revision".to_string(),
            Endpoint::FileRename => "/files/rename".to_string(),
            Endpoint::SseSubscribe => "/sse-subscribe".to_string(),
            Endpoint::SseChanges => "/sse-changes".to_string(),
        }
    }

    /// The change feed is served outside the versioned prefix.
    pub fn is_versioned(&self) -> bool {
        !matches!(self, Endpoint::SseChanges)
    }
}

/// How the request carries its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    /// Serialized JSON document.
    Json(Vec<u8>),
    /// Parameters sent as individual headers, plus an optional raw payload
    /// with its content type.
    Headers {
        params: Vec<(String, String)>,
        payload: Option<(String, Vec<u8>)>,
    },
    /// Pre-encoded multipart body.
    Multipart { boundary: String, bytes: Vec<u8> },
}

/// Immutable description of one API call.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub endpoint: Endpoint,
    pub method: Method,
    pub auth_required: bool,
    pub body: RequestBody,
}

impl RequestDescriptor {
    pub fn new(endpoint: Endpoint, method: Method, auth_required: bool) -> Self {
        Self {
            endpoint,
            method,
            auth_required,
            body: RequestBody::Empty,
        }
    }

    pub fn json<T: Serialize>(
        endpoint: Endpoint,
        method: Method,
        auth_required: bool,
        body: &T,
    ) -> Result<Self, ApiError> {
        let bytes = serde_json::to_vec(body)?;
        Ok(Self {
            body: RequestBody::Json(bytes),
            ..Self::new(endpoint, method, auth_required)
        })
    }

    pub fn with_header_params(
        endpoint: Endpoint,
        method: Method,
        params: Vec<(String, String)>,
        payload: Option<(String, Vec<u8>)>,
    ) -> Self {
        Self {
            body: RequestBody::Headers { params, payload },
            ..Self::new(endpoint, method, true)
        }
    }

    pub fn multipart(endpoint: Endpoint, method: Method, boundary: String, bytes: Vec<u8>) -> Self {
        Self {
            body: RequestBody::Multipart { boundary, bytes },
            ..Self::new(endpoint, method, true)
        }
    }

    /// Build the transport request. `vendor_id` is sent as `Client` on
    /// authenticated requests; `API-KEY` goes on every request.
    pub fn build(&self, config: &Configuration, vendor_id: Option<&str>) -> HttpRequest {
        let url = config.url_for(&self.endpoint.path(), self.endpoint.is_versioned());
        let mut request = HttpRequest::new(self.method, url);

        match &self.body {
            RequestBody::Empty => {
                request.set_header("Content-Type", "application/json");
            }
            RequestBody::Json(bytes) => {
                request.set_header("Content-Type", "application/json");
                request.body = Some(bytes.clone());
            }
            RequestBody::Headers { params, payload } => {
                for (name, value) in params {
                    request.set_header(name, value.clone());
                }
                if let Some((content_type, bytes)) = payload {
                    request.set_header("Content-Type", content_type.clone());
                    request.body = Some(bytes.clone());
                }
            }
            RequestBody::Multipart { boundary, bytes } => {
                request.set_header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={}", boundary),
                );
                request.body = Some(bytes.clone());
            }
        }

        if self.auth_required {
            if let Some(vendor_id) = vendor_id {
                request.set_header("Client", vendor_id);
            }
        }
        request.set_header("API-KEY", config.api_key.clone());
        request
    }
}

/// Content type the backend expects for an uploaded file, by name.
pub fn upload_content_type(file_name: &str) -> &'static str {
    if file_name.contains("png") {
        "image/png"
    } else {
        "application/pdf"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Configuration {
        Configuration::parse("https://api.example.org", "secret-key").unwrap()
    }

    #[test]
    fn test_json_post_headers() {
        let body = serde_json::json!({ "email": "a@b.c" });
        let desc = RequestDescriptor::json(Endpoint::Login, Method::Post, false, &body).unwrap();
        let req = desc.build(&config(), Some("vendor"));

        assert_eq!(req.url, "https://api.example.org/api/v1/auth/login");
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.header("Content-Type"), Some("application/json"));
        assert_eq!(req.header("API-KEY"), Some("secret-key"));
        // unauthenticated requests do not identify the device
        assert_eq!(req.header("Client"), None);
        assert_eq!(req.body.as_deref(), Some(br#"{"email":"a@b.c"}"#.as_slice()));
    }

    #[test]
    fn test_authenticated_request_carries_client() {
        let desc = RequestDescriptor::new(Endpoint::FileInfo, Method::Get, true);
        let req = desc.build(&config(), Some("vendor-1"));
        assert_eq!(req.header("Client"), Some("vendor-1"));
        assert_eq!(req.header("Authorization"), None);
    }

    #[test]
    fn test_header_params_and_payload() {
        let desc = RequestDescriptor::with_header_params(
            Endpoint::Files,
            Method::Put,
            vec![
                ("fileName".to_string(), "scan.png".to_string()),
                ("meta".to_string(), "m".to_string()),
            ],
            Some(("image/png".to_string(), vec![1, 2, 3])),
        );
        let req = desc.build(&config(), Some("v"));
        assert_eq!(req.header("fileName"), Some("scan.png"));
        assert_eq!(req.header("meta"), Some("m"));
        assert_eq!(req.header("Content-Type"), Some("image/png"));
        assert_eq!(req.body, Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_multipart_content_type() {
        let desc =
            RequestDescriptor::multipart(Endpoint::Files, Method::Post, "B-1".into(), vec![0]);
        let req = desc.build(&config(), None);
        assert_eq!(
            req.header("Content-Type"),
            Some("multipart/form-data; boundary=B-1")
        );
    }

    #[test]
    fn test_endpoint_paths() {
        assert_eq!(
            Endpoint::DeleteAccount { user_id: "u 1".into() }.path(),
            "/user/u%201"
        );
        assert_eq!(
            Endpoint::ProfileUpload {
                user_id: "u1".into(),
                location: "Profile".into()
            }
            .path(),
            "/upload/u1?type=Profile"
        );
        assert!(Endpoint::SseSubscribe.is_versioned());
        assert!(!Endpoint::SseChanges.is_versioned());
    }

    #[test]
    fn test_upload_content_type() {
        assert_eq!(upload_content_type("avatar.png"), "image/png");
        assert_eq!(upload_content_type("report.pdf"), "application/pdf");
    }
}

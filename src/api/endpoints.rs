//! Per-endpoint API surface.
//!
//! Thin mappings from typed requests to [`RequestDescriptor`]s. Session
//! side effects (persisting tokens, clearing on sign-out) live here.

use base64::Engine;

use super::auth::SecretStore;
use super::client::CloudClient;
use super::multipart::{self, Part};
use super::request::{upload_content_type, Endpoint, RequestDescriptor};
use super::transport::{Method, Transport};
use super::types::*;
use crate::error::ApiError;

/// Returned when signing out with no stored session.
pub const LOCAL_LOGOUT_MESSAGE: &str =
    "Logged out. It can take till 1 hour to logout in all your devices.";

impl<T: Transport, S: SecretStore> CloudClient<T, S> {
    // ── Auth ────────────────────────────────────────────────────────────

    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
        log::info!("Logging in");
        let desc = RequestDescriptor::json(Endpoint::Login, Method::Post, false, request)?;
        let resp: LoginResponse = self.execute(&desc).await?;
        self.persist_login(&resp).await?;
        Ok(resp)
    }

    pub async fn signup(&self, request: &SignUpRequest) -> Result<LoginResponse, ApiError> {
        log::info!("Signing up");
        let desc = RequestDescriptor::json(Endpoint::SignUp, Method::Post, false, request)?;
        let resp: LoginResponse = self.execute(&desc).await?;
        self.persist_login(&resp).await?;
        Ok(resp)
    }

    pub async fn social_login(
        &self,
        request: &SocialLoginRequest,
    ) -> Result<LoginResponse, ApiError> {
        log::info!("Social login via {:?}", request.social_type);
        let desc = RequestDescriptor::json(Endpoint::SocialLogin, Method::Post, false, request)?;
        let resp: LoginResponse = self.execute(&desc).await?;
        self.persist_login(&resp).await?;
        Ok(resp)
    }

    /// Exchange the stored refresh token for a new token pair.
    pub async fn refresh_token(&self) -> Result<LoginResponse, ApiError> {
        self.request_refresh().await
    }

    /// Invalidate the session server-side and clear local credentials.
    ///
    /// Without a stored session this succeeds locally and sends nothing.
    pub async fn sign_out(&self) -> Result<LogoutResponse, ApiError> {
        if self.current_auth().await?.is_none() {
            return Ok(MessageResponse {
                message: LOCAL_LOGOUT_MESSAGE.to_string(),
            });
        }

        // Resolve through the auth gate first: an expired session is
        // refreshed here, and the rotated refresh token is the one revoked.
        let token = self.usable_token().await?;
        let body = RefreshTokenRequest {
            refresh_token: token.refresh_token.clone(),
        };
        let desc = RequestDescriptor::json(Endpoint::Logout, Method::Post, true, &body)?;
        let resp: LogoutResponse = self.execute(&desc).await?;

        self.session().clear().await?;
        log::info!("Logout complete");
        Ok(resp)
    }

    pub async fn change_password(
        &self,
        request: &ChangePasswordRequest,
    ) -> Result<ChangePasswordResponse, ApiError> {
        let desc = RequestDescriptor::json(Endpoint::ChangePassword, Method::Put, true, request)?;
        self.execute(&desc).await
    }

    pub async fn forgot_password(
        &self,
        request: &ForgotPasswordRequest,
    ) -> Result<ForgotPasswordResponse, ApiError> {
        let desc = RequestDescriptor::json(Endpoint::ForgotPassword, Method::Post, false, request)?;
        self.execute(&desc).await
    }

    pub async fn reset_password(
        &self,
        request: &ResetPasswordRequest,
    ) -> Result<ChangePasswordResponse, ApiError> {
        let desc = RequestDescriptor::json(Endpoint::ResetPassword, Method::Put, false, request)?;
        self.execute(&desc).await
    }

    pub async fn delete_account(&self, user_id: &str) -> Result<DeleteAccountResponse, ApiError> {
        let desc = RequestDescriptor::new(
            Endpoint::DeleteAccount {
                user_id: user_id.to_string(),
            },
            Method::Delete,
            true,
        );
        self.execute(&desc).await
    }

    // ── Files ───────────────────────────────────────────────────────────

    /// Upload a profile picture as a base64 multipart body.
    pub async fn update_profile_picture(
        &self,
        request: &UploadProfileRequest,
    ) -> Result<UploadProfileResponse, ApiError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&request.file);
        let boundary = multipart::generate_boundary();
        let body = multipart::encode(
            &boundary,
            &[Part {
                disposition: r#"form-data; name="file"; filename="file""#.to_string(),
                content_type: Some("application/octet-stream".to_string()),
                body: encoded.as_bytes(),
            }],
        );

        let endpoint = Endpoint::ProfileUpload {
            user_id: request.user_id.clone(),
            location: request.location.as_str().to_string(),
        };
        let desc = RequestDescriptor::multipart(endpoint, Method::Post, boundary, body);
        self.execute(&desc).await
    }

    /// Download an encrypted file with its metadata.
    pub async fn download_file(
        &self,
        request: &DownloadFileRequest,
    ) -> Result<FileResponse, ApiError> {
        let params = vec![
            ("attachmentID".to_string(), request.attachment_id.clone()),
            ("meta".to_string(), request.meta.clone()),
        ];
        let desc = RequestDescriptor::with_header_params(Endpoint::Files, Method::Get, params, None);
        self.execute_download(&desc).await
    }

    /// Upload an encrypted file. The server echoes the stored file back as
    /// a multipart body.
    pub async fn upload_file(&self, request: &UploadFileRequest) -> Result<FileResponse, ApiError> {
        let params = vec![
            ("type".to_string(), request.location.as_str().to_string()),
            ("fileName".to_string(), request.file_name.clone()),
            ("meta".to_string(), request.meta.clone()),
            (
                "encryptedFileKey".to_string(),
                request.encrypted_file_key.clone().unwrap_or_default(),
            ),
            ("hashFileKey".to_string(), request.hash_file_key.clone()),
        ];
        let payload = (
            upload_content_type(&request.file_name).to_string(),
            request.data.clone(),
        );
        let desc =
            RequestDescriptor::with_header_params(Endpoint::Files, Method::Put, params, Some(payload));
        self.execute_download(&desc).await
    }

    pub async fn delete_file(&self, attachment_id: &str) -> Result<DeleteFileResponse, ApiError> {
        let desc = attachment_request(Endpoint::Files, Method::Delete, attachment_id, None);
        self.execute(&desc).await
    }

    pub async fn file_info(&self, attachment_id: &str) -> Result<FileInfo, ApiError> {
        let desc = attachment_request(Endpoint::FileInfo, Method::Get, attachment_id, None);
        self.execute(&desc).await
    }

    pub async fn file_revision(&self, attachment_id: &str) -> Result<RevisionResponse, ApiError> {
        let desc = attachment_request(Endpoint::FileRevision, Method::Get, attachment_id, None);
        self.execute(&desc).await
    }

    pub async fn rename_file(&self, attachment_id: &str, name: &str) -> Result<FileInfo, ApiError> {
        let desc = attachment_request(Endpoint::FileRename, Method::Get, attachment_id, Some(name));
        self.execute(&desc).await
    }
}

fn attachment_request(
    endpoint: Endpoint,
    method: Method,
    attachment_id: &str,
    name: Option<&str>,
) -> RequestDescriptor {
    let mut params = vec![("attachmentID".to_string(), attachment_id.to_string())];
    if let Some(name) = name {
        params.push(("name".to_string(), name.to_string()));
    }
    RequestDescriptor::with_header_params(endpoint, method, params, None)
}

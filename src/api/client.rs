//! Authenticated request pipeline.
//!
//! [`CloudClient`] owns the configuration, the transport and the session.
//! Every call goes build -> auth check -> (refresh) -> send -> classify ->
//! decode, and every failure comes back as an [`ApiError`].

use serde::de::DeserializeOwned;

use super::auth::SecretStore;
use super::multipart::{self, MultipartSegment};
use super::request::{Endpoint, RequestDescriptor};
use super::token::AuthToken;
use super::transport::{HttpResponse, HttpTransport, Method, Transport};
use super::types::{FileResponse, LoginResponse, Metadata, RefreshTokenRequest};
use crate::config::Configuration;
use crate::error::ApiError;
use crate::state::Session;

#[cfg(feature = "keychain")]
use super::auth::KeyringStore;

/// Client for the TheraForge backend.
pub struct CloudClient<T: Transport, S: SecretStore> {
    config: Configuration,
    transport: T,
    session: Session<S>,
}

#[cfg(feature = "keychain")]
impl CloudClient<HttpTransport, KeyringStore> {
    /// Production client: reqwest transport and OS keychain.
    pub fn new(config: Configuration) -> Result<Self, ApiError> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_parts(config, transport, KeyringStore::new()))
    }
}

impl<S: SecretStore> CloudClient<HttpTransport, S> {
    /// reqwest transport with a caller-provided secret store.
    pub fn with_store(config: Configuration, store: S) -> Result<Self, ApiError> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_parts(config, transport, store))
    }
}

impl<T: Transport, S: SecretStore> CloudClient<T, S> {
    pub fn with_parts(config: Configuration, transport: T, store: S) -> Self {
        Self {
            config,
            transport,
            session: Session::new(store),
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn session(&self) -> &Session<S> {
        &self.session
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Currently stored token pair, if any.
    pub async fn current_auth(&self) -> Result<Option<AuthToken>, ApiError> {
        Ok(self.session.token().await?)
    }

    pub async fn vendor_id(&self) -> Result<String, ApiError> {
        Ok(self.session.vendor_id().await?)
    }

    /// Execute a call that answers with JSON.
    pub async fn execute<R: DeserializeOwned>(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<R, ApiError> {
        let response = self.send_authorized(descriptor).await?;
        classify(response, |resp| decode_json(&resp.body))
    }

    /// Execute a call that answers with a metadata + attachment multipart body.
    pub async fn execute_download(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<FileResponse, ApiError> {
        let response = self.send_authorized(descriptor).await?;
        classify(response, decode_file_response)
    }

    /// Auth gate: missing token fails without I/O, expired token is
    /// refreshed first, then the request goes out with the current bearer.
    async fn send_authorized(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<HttpResponse, ApiError> {
        if !descriptor.auth_required {
            let request = descriptor.build(&self.config, None);
            return self.send(request).await;
        }

        let token = self.usable_token().await.map_err(|e| {
            if e.is_missing_credential() {
                log::warn!(
                    "{} {} requires authentication but no credential is stored",
                    descriptor.method.as_str(),
                    descriptor.endpoint.path()
                );
            }
            e
        })?;

        let vendor_id = self.session.vendor_id().await?;
        let mut request = descriptor.build(&self.config, Some(&vendor_id));
        request.set_header("Authorization", token.bearer());
        self.send(request).await
    }

    /// Stored token, refreshed first if it has expired.
    pub(crate) async fn usable_token(&self) -> Result<AuthToken, ApiError> {
        let Some(token) = self.session.token().await? else {
            return Err(ApiError::missing_credential());
        };
        if token.is_valid() {
            Ok(token)
        } else {
            self.refresh_expired().await
        }
    }

    /// Refresh unless another caller already did while we waited.
    async fn refresh_expired(&self) -> Result<AuthToken, ApiError> {
        let _guard = self.session.lock_refresh().await;

        match self.session.token().await? {
            Some(token) if token.is_valid() => {
                log::debug!("Token already refreshed by a concurrent request");
                Ok(token)
            }
            Some(_) => {
                log::info!("Access token expired, refreshing");
                let login = self.request_refresh().await?;
                Ok(login.access_token)
            }
            None => Err(ApiError::missing_credential()),
        }
    }

    /// POST the stored refresh token (unauthenticated) and persist the result.
    pub(crate) async fn request_refresh(&self) -> Result<LoginResponse, ApiError> {
        let Some(current) = self.session.token().await? else {
            return Err(ApiError::missing_credential());
        };
        let body = RefreshTokenRequest {
            refresh_token: current.refresh_token.clone(),
        };
        let descriptor = RequestDescriptor::json(Endpoint::RefreshToken, Method::Post, false, &body)?;
        // Sent directly: going through the auth gate here would make the
        // future type recursive.
        let response = self.send(descriptor.build(&self.config, None)).await?;
        let login: LoginResponse = classify(response, |resp| decode_json(&resp.body))?;
        self.persist_login(&login).await?;
        Ok(login)
    }

    /// Post-success hook for login, signup, social login and refresh.
    pub(crate) async fn persist_login(&self, login: &LoginResponse) -> Result<(), ApiError> {
        self.session
            .set_session(&login.access_token, &login.data)
            .await?;
        log::info!("Stored new session for user {}", login.data.id);
        Ok(())
    }

    async fn send(&self, request: super::transport::HttpRequest) -> Result<HttpResponse, ApiError> {
        log::debug!("Sending {} {}", request.method.as_str(), request.url);
        self.transport.send(request).await.map_err(|e| {
            log::warn!("Transport failure: {}", e);
            ApiError::from(e)
        })
    }
}

/// Branch on status: 2xx -> `on_success`, 4xx -> server error payload,
/// anything else -> fixed unknown-code error without reading the body.
fn classify<R>(
    response: HttpResponse,
    on_success: impl FnOnce(&HttpResponse) -> Result<R, ApiError>,
) -> Result<R, ApiError> {
    match response.status {
        200..=299 => {
            if response.body.is_empty() {
                return Err(ApiError::empty());
            }
            on_success(&response)
        }
        400..=499 => {
            if response.body.is_empty() {
                return Err(ApiError::empty());
            }
            let error: ApiError = serde_json::from_slice(&response.body)?;
            log::debug!("Server reported {}: {}", response.status, error.message);
            Err(error)
        }
        status => {
            log::warn!("Unexpected status {}", status);
            Err(ApiError::unknown_error_code())
        }
    }
}

fn decode_json<R: DeserializeOwned>(body: &[u8]) -> Result<R, ApiError> {
    Ok(serde_json::from_slice(body)?)
}

fn decode_file_response(response: &HttpResponse) -> Result<FileResponse, ApiError> {
    let boundary = response
        .header("Content-Type")
        .and_then(multipart::boundary_from_content_type)
        .ok_or_else(ApiError::boundary_not_found)?;

    let segments = multipart::decode(&response.body, boundary).ok_or_else(ApiError::boundary_not_found)?;
    let attachment = find_segment(&segments, "attachment").ok_or_else(ApiError::corrupt_data)?;
    let metadata = find_segment(&segments, "metadata").ok_or_else(ApiError::corrupt_data)?;

    let metadata: Metadata = serde_json::from_slice(&metadata.body)?;
    Ok(FileResponse {
        metadata,
        data: attachment.body.clone(),
    })
}

fn find_segment<'a>(segments: &'a [MultipartSegment], label: &str) -> Option<&'a MultipartSegment> {
    segments.iter().find(|s| s.label.contains(label))
}

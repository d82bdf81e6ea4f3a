//! HTTP transport seam.
//!
//! The pipeline talks to the network only through [`Transport`], so tests
//! can count and script calls. [`HttpTransport`] is the reqwest-backed
//! implementation used in production.

use std::time::Duration;

use reqwest::Client;

use crate::config::Configuration;
use crate::error::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

/// Fully built request, ready to send.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Replace any existing value for `name`.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }
}

/// Status, headers and fully read body.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Sends one request and reads the whole response.
///
/// Errors mean no HTTP status was received; any status (including 4xx/5xx)
/// is an `Ok` response.
#[allow(async_fn_in_trait)]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// reqwest-backed transport.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &Configuration) -> Result<Self, TransportError> {
        let client = Self::builder(config).build()?;
        Ok(Self { client })
    }

    fn builder(config: &Configuration) -> reqwest::ClientBuilder {
        let builder = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10));
        pin_tls(builder, config)
    }
}

/// Apply the optional TLS 1.3 min/max pin.
pub(crate) fn pin_tls(builder: reqwest::ClientBuilder, config: &Configuration) -> reqwest::ClientBuilder {
    if config.pin_tls13 {
        builder
            .min_tls_version(reqwest::tls::Version::TLS_1_3)
            .max_tls_version(reqwest::tls::Version::TLS_1_3)
    } else {
        builder
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|_| TransportError::InvalidUrl(request.url.clone()))?;
        let url = reqwest::Url::parse(&request.url)
            .map_err(|_| TransportError::InvalidUrl(request.url.clone()))?;

        // Never serve from a cache.
        let mut builder = self
            .client
            .request(method, url)
            .header("Cache-Control", "no-cache");
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let resp = builder.send().await.map_err(|e| {
            if e.is_redirect() {
                TransportError::NoResponse
            } else {
                TransportError::Request(e)
            }
        })?;

        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let body = resp.bytes().await?.to_vec();

        log::debug!(
            "{} {} -> {} ({} bytes)",
            request.method.as_str(),
            request.url,
            status,
            body.len()
        );

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

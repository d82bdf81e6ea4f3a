//! Server-sent event streams.
//!
//! [`EventSource`] holds one long-lived connection. The observe helpers on
//! [`CloudClient`] build sources for the backend's two streams with the
//! right headers; callers register callbacks and then call `connect`.

mod event;
mod event_source;


pub use event::{parse_chunk, Event, USER_CONNECTED};
pub use event_source::{
    handle_chunk, should_reconnect, CompleteCallback, Completion, EventSource, MessageCallback,
    OpenCallback, ReadyState, DEFAULT_RETRY_TIME,
};

use crate::api::auth::SecretStore;
use crate::api::client::CloudClient;
use crate::api::request::Endpoint;
use crate::api::token::AuthToken;
use crate::api::transport::Transport;
use crate::error::ApiError;

impl<T: Transport, S: SecretStore> CloudClient<T, S> {
    /// Subscription stream for the signed-in user. Returned unconnected.
    pub async fn observe_server_sent_events(
        &self,
        auth: &AuthToken,
    ) -> Result<EventSource, ApiError> {
        let endpoint = Endpoint::SseSubscribe;
        let url = self.config().url_for(&endpoint.path(), endpoint.is_versioned());
        let headers = vec![
            ("Authorization".to_string(), auth.bearer()),
            ("Client".to_string(), self.vendor_id().await?),
            ("API-KEY".to_string(), self.config().api_key.clone()),
        ];

        let source = EventSource::new(url, headers, self.config())?;
        source.add_event_listener(USER_CONNECTED, |event| {
            log::info!("SSE subscription registered: {}", event.raw);
        });
        Ok(source)
    }

    /// Document change feed. Returned unconnected.
    pub async fn observe_change_events(&self, auth: &AuthToken) -> Result<EventSource, ApiError> {
        let endpoint = Endpoint::SseChanges;
        let url = self.config().url_for(&endpoint.path(), endpoint.is_versioned());
        let headers = vec![
            ("Authorization".to_string(), auth.bearer()),
            ("Client".to_string(), self.vendor_id().await?),
        ];
        EventSource::new(url, headers, self.config())
    }
}

//! Client SDK for the TheraForge cloud backend.
//!
//! Authentication with transparent token refresh, encrypted file transfer
//! over the backend's multipart framing, and server-sent event streams.
//! Everything hangs off an explicitly constructed [`CloudClient`].

pub mod api;
pub mod config;
pub mod error;
pub mod sse;
pub mod state;

pub use api::auth::{MemoryStore, SecretKey, SecretStore};
#[cfg(feature = "keychain")]
pub use api::auth::KeyringStore;
pub use api::client::CloudClient;
pub use api::token::AuthToken;
pub use api::transport::{HttpTransport, Transport};
pub use config::Configuration;
pub use error::ApiError;
pub use sse::{Event, EventSource, ReadyState};

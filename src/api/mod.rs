//! API client module for the TheraForge backend.
//!
//! Provides the request pipeline with bearer/refresh handling, keychain
//! token storage, multipart codec, and request/response types matching the
//! backend API.

pub mod auth;
pub mod client;
pub mod endpoints;
pub mod multipart;
pub mod request;
pub mod token;
pub mod transport;
pub mod types;

//! Core library for the MedVault hospital management client.
//!
//! This crate owns everything below the presentation layer:
//!
//! - `config`: configuration file, environment overrides, base URL resolution
//! - `auth`: token storage, session events and the session controller
//! - `api`: the authenticated HTTP client and domain resource helpers
//! - `models`: user and authentication payloads
//! - `navigation`: how a front end should react to session events

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod navigation;

pub use api::{ApiClient, ApiError, ApiResponse, RequestOptions};
pub use auth::{
    AuthError, FileTokenStore, KeyringTokenStore, MemoryTokenStore, Session, SessionEvent,
    SessionEvents, SessionState, TokenStore,
};
pub use config::{resolve_base_url, Config, TokenBackend};
pub use models::{Registration, Role, User};

//! Authentication module for managing the session token and current user.
//!
//! This module provides:
//! - `TokenStore`: where the bearer token lives (memory, file or OS keychain)
//! - `SessionEvents`: broadcast of login, logout and expiry
//! - `Session`: the session controller owning the current user
//!
//! Tokens are never refreshed; a 401 from the backend ends the session.

pub mod events;
pub mod session;
pub mod token;

pub use events::{SessionEvent, SessionEvents};
pub use session::{AuthError, Session, SessionState};
pub use token::{
    open_token_store, FileTokenStore, KeyringTokenStore, MemoryTokenStore, SharedTokenStore,
    TokenStore,
};

//! Data models for MedVault authentication payloads.
//!
//! This module contains the structures exchanged with `/api/auth/...`:
//!
//! - `User`, `Role`: the current user as reported by login and validation
//! - `Registration`: the fields accepted by the registration endpoint
//! - `LoginRequest`, `LoginResponse`, `ValidateResponse`: wire payloads
//!
//! Domain resources (appointments, prescriptions, ...) are owned by the
//! backend and handled as raw JSON by `api::resources`.

pub mod auth;
pub mod user;

pub use auth::{LoginRequest, LoginResponse, Registration, ValidateResponse};
pub use user::{Role, User};

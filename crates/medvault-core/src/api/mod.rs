//! REST API client module for the MedVault backend.
//!
//! This module provides the `ApiClient` for issuing authenticated requests
//! against the backend's `/api/...` endpoints, and thin helpers for the
//! patient and doctor resources the dashboards consume.
//!
//! The backend uses JWT bearer token authentication obtained through
//! `POST /api/auth/login`.

pub mod client;
pub mod error;
pub mod resources;

pub use client::{parse_body, ApiClient, ApiResponse, RequestOptions};
pub use error::ApiError;
pub use resources::{AppointmentStatus, PatientDashboard};

use serde::{Deserialize, Serialize};

use super::{Role, User};

/// Body of `POST /api/auth/login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Successful answer of `POST /api/auth/login`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// Answer of `GET /api/auth/validate`.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidateResponse {
    #[serde(default)]
    pub valid: bool,
    pub user: Option<User>,
}

/// Body of `POST /api/auth/register`.
///
/// Patients may fill in contact and blood group details, doctors their
/// specialization and license number.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// ISO date, `YYYY-MM-DD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_number: Option<String>,
}

impl Registration {
    pub fn new(email: &str, password: &str, name: &str, role: Role) -> Self {
        Self {
            email: email.to_string(),
            password: password.to_string(),
            name: name.to_string(),
            role,
            phone: None,
            address: None,
            date_of_birth: None,
            emergency_contact: None,
            blood_group: None,
            specialization: None,
            license_number: None,
        }
    }
}

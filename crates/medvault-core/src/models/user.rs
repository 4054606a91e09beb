use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Account role. The backend sends `patient` on login but `PATIENT` on
/// validation, so parsing ignores case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
    Other(String),
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "patient" => Role::Patient,
            "doctor" => Role::Doctor,
            "admin" => Role::Admin,
            _ => Role::Other(s),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Admin => "admin",
            Role::Other(s) => s.as_str(),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated user.
///
/// Only `id` is guaranteed; everything the backend sends beyond the
/// identity fields is kept in `profile`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

impl User {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            email: None,
            name: None,
            role: None,
            profile: Map::new(),
        }
    }

    pub fn display_name(&self) -> String {
        match (&self.name, &self.email) {
            (Some(name), _) if !name.is_empty() => name.clone(),
            (_, Some(email)) => email.clone(),
            _ => format!("User #{}", self.id),
        }
    }

    pub fn is_doctor(&self) -> bool {
        self.role == Some(Role::Doctor)
    }

    pub fn is_patient(&self) -> bool {
        self.role == Some(Role::Patient)
    }
}

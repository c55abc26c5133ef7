//! Person model: every authenticated user of the system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role tag carried by every Person and embedded in access tokens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    Headmaster,
    Teacher,
    Parent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Headmaster => "Headmaster",
            Role::Teacher => "Teacher",
            Role::Parent => "Parent",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Headmaster" => Some(Role::Headmaster),
            "Teacher" => Some(Role::Teacher),
            "Parent" => Some(Role::Parent),
            _ => None,
        }
    }
}

/// A registered user. The credential hash and refresh token never leave the repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for registering a new Person.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub role: Role,
}

/// Request body for logging in with either email or phone.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub password: String,
}

/// Optional body for the refresh endpoint; the cookie takes precedence.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Tokens handed out on login and refresh.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub person: Person,
    pub access_token: String,
    pub refresh_token: String,
}

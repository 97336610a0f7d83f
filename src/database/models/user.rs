use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role '{0}', expected admin or user")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub telegram_username: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub additional_info: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Validated fields for creating or replacing a user
#[derive(Debug, Clone, PartialEq)]
pub struct UserInput {
    pub telegram_username: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub additional_info: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidUsername {
    #[error("is required")]
    Empty,
    #[error("may only contain letters, digits and underscores")]
    Characters,
}

impl UserInput {
    /// Telegram username as stored: trimmed, leading `@` stripped,
    /// letters, digits and `_` only
    pub fn normalize_username(raw: &str) -> Result<String, InvalidUsername> {
        let name = raw.trim();
        let name = name.strip_prefix('@').unwrap_or(name);
        if name.is_empty() {
            return Err(InvalidUsername::Empty);
        }
        if !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(InvalidUsername::Characters);
        }
        Ok(name.to_string())
    }
}

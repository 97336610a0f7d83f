use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Object {
    pub id: i64,
    pub name: String,
    pub additional_info: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectInput {
    pub name: String,
    pub additional_info: Option<String>,
}

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Grants `user_id` visibility into the markers of `object_id`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, FromRow)]
pub struct Appointment {
    pub user_id: i64,
    pub object_id: i64,
}

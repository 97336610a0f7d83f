// handlers/mod.rs - Three handler tiers
//
// Public (no auth) → Protected (`require_user`) → Elevated (`require_admin`).
// The tiers map onto the route groups assembled in `app::router`.

pub mod elevated;
pub mod protected;
pub mod public;

use crate::database::DatabaseError;
use crate::error::ApiError;

/// Map a uniqueness violation to a 400 with `message`; other errors convert as usual
pub(crate) fn unique_as(message: &'static str) -> impl Fn(DatabaseError) -> ApiError {
    move |err| match err {
        DatabaseError::UniqueViolation(_) => ApiError::conflict(message),
        other => other.into(),
    }
}

// handlers/elevated/mod.rs - Elevated handlers (admin role required)
//
// Routes here sit behind `require_admin`: user management, object
// management, the assignment matrix and per-object marker listings.

pub mod assignments;
pub mod markers;
pub mod objects;
pub mod users;

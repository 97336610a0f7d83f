// handlers/protected/mod.rs - Protected handlers (valid bearer token required)
//
// Every route here sits behind `require_user`, which puts the caller's
// `AuthUser` into the request extensions. Marker, object and photo reads are
// scoped to the objects the caller is appointed to; admins see everything.

pub mod marker_form;
pub mod markers;
pub mod me;
pub mod objects;
pub mod photo;

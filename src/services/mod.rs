pub mod markers;
pub mod visibility;

pub use markers::{MarkerError, MarkerService, PhotoUpload};
pub use visibility::visibility_for;

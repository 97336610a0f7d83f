pub mod appointment;
pub mod marker;
pub mod object;
pub mod photo;
pub mod user;

pub use appointment::Appointment;
pub use marker::{Color, Marker, MarkerDraft, MarkerPatch};
pub use object::{Object, ObjectInput};
pub use photo::{NewPhoto, Photo};
pub use user::{Role, User, UserInput};

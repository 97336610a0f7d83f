pub mod auth;
pub mod response;

pub use auth::{require_admin, require_user, AuthUser};
pub use response::{ApiResponse, ApiResult};

pub mod auth;
pub mod response;

pub use auth::{require_admin, require_auth, require_student, require_teacher, CurrentUser};
pub use response::{ApiResponse, ApiResult};

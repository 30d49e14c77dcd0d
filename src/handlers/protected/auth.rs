use axum::Extension;

use crate::api::views::UserDetail;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};

/// GET /api/auth/whoami - the caller's account as loaded for this request
pub async fn whoami(Extension(CurrentUser(user)): Extension<CurrentUser>) -> ApiResult<UserDetail> {
    Ok(ApiResponse::success(UserDetail::from(&user)))
}

use axum::{extract::rejection::JsonRejection, extract::State, Json};

use crate::app::AppState;
use crate::handlers::json_body;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::accounts::{LoginRequest, LoginResponse, RefreshRequest, RefreshResponse};
use crate::services::AccountService;

/// POST /auth/login - exchange email and password for a token pair
///
/// ```json
/// { "email": "amy@example.com", "password": "..." }
/// ```
///
/// Responds with `{message, user: {id, username, email, role}, access, refresh}`.
pub async fn login_post(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<LoginResponse> {
    let request = json_body(payload)?;
    let response = AccountService::new(&state).login(request).await?;
    Ok(ApiResponse::success(response))
}

/// POST /auth/refresh - new access token from a refresh token
pub async fn refresh_post(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult<RefreshResponse> {
    let request = json_body(payload)?;
    let response = AccountService::new(&state).refresh(request).await?;
    Ok(ApiResponse::success(response))
}

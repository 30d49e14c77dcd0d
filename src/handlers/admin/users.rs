use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::views::{Message, MessageWith, UserDetail, UserSummary};
use crate::app::AppState;
use crate::handlers::{json_body, path_param, query_params};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::accounts::{CreateUserRequest, UpdateUserRequest};
use crate::services::AccountService;

#[derive(Debug, Serialize)]
pub struct CreatedUser {
    pub user: UserSummary,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub role: Option<String>,
}

/// POST /api/admin/create-user (also POST /api/admin/users)
///
/// Role must be `student` or `teacher` and defaults to `student`. A password is generated and mailed to
/// the new account; it is never part of the response.
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<MessageWith<CreatedUser>> {
    let request = json_body(payload)?;
    let user = AccountService::new(&state).create_user(request).await?;
    Ok(ApiResponse::created(MessageWith::new(
        "User created successfully",
        CreatedUser {
            user: UserSummary::from(&user),
        },
    )))
}

/// GET /api/admin/users[?role=teacher]
pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Vec<UserDetail>> {
    let query = query_params(query)?;
    let users = AccountService::new(&state).list_users(query.role.as_deref()).await?;
    Ok(ApiResponse::success(users.iter().map(UserDetail::from).collect()))
}

/// GET /api/admin/users/:id
pub async fn show(State(state): State<AppState>, id: Result<Path<Uuid>, PathRejection>) -> ApiResult<UserDetail> {
    let user = AccountService::new(&state).get_user(path_param(id)?).await?;
    Ok(ApiResponse::success(UserDetail::from(&user)))
}

/// PUT|PATCH /api/admin/users/:id
pub async fn update(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> ApiResult<UserDetail> {
    let id = path_param(id)?;
    let request = json_body(payload)?;
    let user = AccountService::new(&state).update_user(id, request).await?;
    Ok(ApiResponse::success(UserDetail::from(&user)))
}

/// DELETE /api/admin/users/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Message> {
    AccountService::new(&state).delete_user(&actor, path_param(id)?).await?;
    Ok(ApiResponse::success(Message::new("User deleted successfully")))
}

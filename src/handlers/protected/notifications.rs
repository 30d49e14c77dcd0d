use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Extension;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::views::NotificationView;
use crate::app::AppState;
use crate::handlers::{path_param, query_params};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::NotificationService;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub unread: bool,
}

/// GET /api/notifications[?unread=true]
pub async fn list(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Vec<NotificationView>> {
    let query = query_params(query)?;
    let notifications = NotificationService::new(&state).list(&user, query.unread).await?;
    Ok(ApiResponse::success(notifications.iter().map(NotificationView::from).collect()))
}

/// POST /api/notifications/:id/read
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<NotificationView> {
    let id = path_param(id)?;
    let notification = NotificationService::new(&state).mark_read(&user, id).await?;
    Ok(ApiResponse::success(NotificationView::from(&notification)))
}

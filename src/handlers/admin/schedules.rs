use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use crate::api::views::{Message, ScheduleView};
use crate::app::AppState;
use crate::database::models::CourseSchedule;
use crate::error::ApiError;
use crate::handlers::{json_body, path_param};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::schedules::ScheduleRequest;
use crate::services::{CourseService, ScheduleService};

/// GET /api/admin/courses/:id/schedules
pub async fn list(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Vec<ScheduleView>> {
    let schedules = ScheduleService::new(&state).list(path_param(id)?).await?;
    let views = CourseService::new(&state).schedule_views(&schedules).await?;
    Ok(ApiResponse::success(views))
}

/// POST /api/admin/courses/:id/schedules
///
/// ```json
/// { "day_of_week": 0, "start_time": "09:00", "end_time": "10:30", "location": "Room 4", "teacher_id": null }
/// ```
pub async fn create(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ScheduleRequest>, JsonRejection>,
) -> ApiResult<ScheduleView> {
    let course_id = path_param(id)?;
    let request = json_body(payload)?;
    let schedule = ScheduleService::new(&state).create(course_id, request).await?;
    Ok(ApiResponse::created(view(&state, schedule).await?))
}

/// GET /api/admin/schedules/:id
pub async fn show(State(state): State<AppState>, id: Result<Path<Uuid>, PathRejection>) -> ApiResult<ScheduleView> {
    let schedule = ScheduleService::new(&state).get(path_param(id)?).await?;
    Ok(ApiResponse::success(view(&state, schedule).await?))
}

/// PUT|PATCH /api/admin/schedules/:id
pub async fn update(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ScheduleRequest>, JsonRejection>,
) -> ApiResult<ScheduleView> {
    let id = path_param(id)?;
    let request = json_body(payload)?;
    let schedule = ScheduleService::new(&state).update(id, request).await?;
    Ok(ApiResponse::success(view(&state, schedule).await?))
}

/// DELETE /api/admin/schedules/:id
pub async fn delete(State(state): State<AppState>, id: Result<Path<Uuid>, PathRejection>) -> ApiResult<Message> {
    ScheduleService::new(&state).delete(path_param(id)?).await?;
    Ok(ApiResponse::success(Message::new("Schedule deleted successfully")))
}

async fn view(state: &AppState, schedule: CourseSchedule) -> Result<ScheduleView, ApiError> {
    let mut views = CourseService::new(state).schedule_views(&[schedule]).await?;
    views
        .pop()
        .ok_or_else(|| ApiError::internal_server_error("Failed to render schedule"))
}

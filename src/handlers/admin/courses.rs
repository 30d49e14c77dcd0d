use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::api::views::{CourseDetail, CourseView, Message, MessageWith, PersonBrief};
use crate::app::AppState;
use crate::handlers::{json_body, path_param};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::courses::{AssignTeacherRequest, CourseRequest};
use crate::services::CourseService;

#[derive(Debug, Serialize)]
pub struct Assignment {
    pub course_id: Uuid,
    pub teacher_id: Uuid,
    pub assigned_at: DateTime<Utc>,
}

/// GET /api/admin/courses
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<CourseView>> {
    let courses = CourseService::new(&state).list_courses().await?;
    Ok(ApiResponse::success(courses.iter().map(CourseView::from).collect()))
}

/// POST /api/admin/courses
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<CourseRequest>, JsonRejection>,
) -> ApiResult<CourseView> {
    let request = json_body(payload)?;
    let course = CourseService::new(&state).create_course(request).await?;
    Ok(ApiResponse::created(CourseView::from(&course)))
}

/// GET /api/admin/courses/:id - with teachers, schedules and student count
pub async fn show(State(state): State<AppState>, id: Result<Path<Uuid>, PathRejection>) -> ApiResult<CourseDetail> {
    let detail = CourseService::new(&state).course_detail(path_param(id)?).await?;
    Ok(ApiResponse::success(detail))
}

/// PUT|PATCH /api/admin/courses/:id
pub async fn update(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<CourseRequest>, JsonRejection>,
) -> ApiResult<CourseView> {
    let id = path_param(id)?;
    let request = json_body(payload)?;
    let course = CourseService::new(&state).update_course(id, request).await?;
    Ok(ApiResponse::success(CourseView::from(&course)))
}

/// DELETE /api/admin/courses/:id
pub async fn delete(State(state): State<AppState>, id: Result<Path<Uuid>, PathRejection>) -> ApiResult<Message> {
    CourseService::new(&state).delete_course(path_param(id)?).await?;
    Ok(ApiResponse::success(Message::new("Course deleted successfully")))
}

/// POST /api/admin/courses/:id/teachers - `{teacher_id}`
pub async fn assign_teacher(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<AssignTeacherRequest>, JsonRejection>,
) -> ApiResult<MessageWith<Assignment>> {
    let course_id = path_param(id)?;
    let request = json_body(payload)?;
    let assignment = CourseService::new(&state)
        .assign_teacher(course_id, request.teacher_id)
        .await?;
    Ok(ApiResponse::created(MessageWith::new(
        "Teacher assigned successfully",
        Assignment {
            course_id: assignment.course_id,
            teacher_id: assignment.teacher_id,
            assigned_at: assignment.assigned_at,
        },
    )))
}

/// DELETE /api/admin/courses/:id/teachers/:teacher_id
pub async fn unassign_teacher(
    State(state): State<AppState>,
    ids: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> ApiResult<Message> {
    let (course_id, teacher_id) = path_param(ids)?;
    CourseService::new(&state).unassign_teacher(course_id, teacher_id).await?;
    Ok(ApiResponse::success(Message::new("Teacher removed from course successfully")))
}

/// GET /api/admin/courses/:id/students
pub async fn students(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Vec<PersonBrief>> {
    let students = CourseService::new(&state).course_students(path_param(id)?).await?;
    Ok(ApiResponse::success(students.iter().map(PersonBrief::from).collect()))
}

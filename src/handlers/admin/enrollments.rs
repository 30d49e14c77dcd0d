use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};

use crate::api::views::{EnrollmentCreated, EnrollmentView, Message, MessageWith};
use crate::app::AppState;
use crate::handlers::json_body;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::enrollment::EnrollmentRequest;
use crate::services::EnrollmentService;

/// POST /api/admin/enrollments - `{student_id, course_id}`
pub async fn enroll(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    payload: Result<Json<EnrollmentRequest>, JsonRejection>,
) -> ApiResult<MessageWith<EnrollmentCreated>> {
    let (student_id, course_id) = json_body(payload)?.ids()?;
    let enrollment = EnrollmentService::new(&state)
        .enroll(&actor, student_id, course_id)
        .await?;
    Ok(ApiResponse::created(MessageWith::new(
        "Student enrolled successfully",
        EnrollmentCreated {
            enrollment: EnrollmentView::from(&enrollment),
        },
    )))
}

/// DELETE /api/admin/enrollments - `{student_id, course_id}`
pub async fn unenroll(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    payload: Result<Json<EnrollmentRequest>, JsonRejection>,
) -> ApiResult<Message> {
    let (student_id, course_id) = json_body(payload)?.ids()?;
    EnrollmentService::new(&state)
        .unenroll(&actor, student_id, course_id)
        .await?;
    Ok(ApiResponse::success(Message::new("Student removed from course successfully")))
}

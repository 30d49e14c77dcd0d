// handlers/student.rs - /api/student/*, role == student

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};

use crate::api::views::{CourseDetail, StudentProfile, TimetableEntry};
use crate::app::AppState;
use crate::handlers::json_body;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::accounts::StudentProfileUpdate;
use crate::services::{AccountService, CourseService};

/// GET /api/student/profile
pub async fn profile_get(Extension(CurrentUser(user)): Extension<CurrentUser>) -> ApiResult<StudentProfile> {
    Ok(ApiResponse::success(StudentProfile::from(&user)))
}

/// PUT /api/student/profile - only `first_name`, `last_name` and `password` are written
pub async fn profile_put(
    state: State<AppState>,
    current: Extension<CurrentUser>,
    payload: Result<Json<StudentProfileUpdate>, JsonRejection>,
) -> ApiResult<StudentProfile> {
    profile_patch(state, current, payload).await
}

/// PATCH /api/student/profile
pub async fn profile_patch(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    payload: Result<Json<StudentProfileUpdate>, JsonRejection>,
) -> ApiResult<StudentProfile> {
    let request = json_body(payload)?;
    let updated = AccountService::new(&state)
        .update_student_profile(&user, request)
        .await?;
    Ok(ApiResponse::success(StudentProfile::from(&updated)))
}

/// GET /api/student/enrolled-courses - courses with teachers and schedules
pub async fn enrolled_courses(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Vec<CourseDetail>> {
    let courses = CourseService::new(&state).enrolled_courses(&user).await?;
    Ok(ApiResponse::success(courses))
}

/// GET /api/student/schedule - the week's sessions across all enrolled courses
pub async fn weekly_schedule(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Vec<TimetableEntry>> {
    let entries = CourseService::new(&state).weekly_schedule(&user).await?;
    Ok(ApiResponse::success(entries))
}

// handlers/teacher.rs - /api/teacher/*, role == teacher
//
// Profile endpoints always act on the caller. Enrollment changes are limited
// to courses the caller is assigned to.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};

use crate::api::views::{CourseDetail, CourseRoster, EnrollmentCreated, EnrollmentView, Message, MessageWith, TeacherProfile};
use crate::app::AppState;
use crate::database::models::User;
use crate::handlers::json_body;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::accounts::TeacherProfileUpdate;
use crate::services::enrollment::EnrollmentRequest;
use crate::services::{AccountService, CourseService, EnrollmentService};

/// GET /api/teacher/profile
pub async fn profile_get(Extension(CurrentUser(user)): Extension<CurrentUser>) -> ApiResult<TeacherProfile> {
    Ok(ApiResponse::success(TeacherProfile::from(&user)))
}

/// PUT /api/teacher/profile - `username` required; `email` and `role` are ignored
pub async fn profile_put(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    payload: Result<Json<TeacherProfileUpdate>, JsonRejection>,
) -> ApiResult<TeacherProfile> {
    update_profile(state, user, payload, false).await
}

/// PATCH /api/teacher/profile
pub async fn profile_patch(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    payload: Result<Json<TeacherProfileUpdate>, JsonRejection>,
) -> ApiResult<TeacherProfile> {
    update_profile(state, user, payload, true).await
}

async fn update_profile(
    state: AppState,
    user: User,
    payload: Result<Json<TeacherProfileUpdate>, JsonRejection>,
    partial: bool,
) -> ApiResult<TeacherProfile> {
    let request = json_body(payload)?;
    let updated = AccountService::new(&state)
        .update_teacher_profile(&user, request, partial)
        .await?;
    Ok(ApiResponse::success(TeacherProfile::from(&updated)))
}

/// GET /api/teacher/assigned-courses
pub async fn assigned_courses(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Vec<CourseDetail>> {
    let courses = CourseService::new(&state).assigned_courses(&user).await?;
    Ok(ApiResponse::success(courses))
}

/// GET /api/teacher/courses-with-students
pub async fn courses_with_students(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Vec<CourseRoster>> {
    let rosters = CourseService::new(&state).courses_with_students(&user).await?;
    Ok(ApiResponse::success(rosters))
}

/// POST /api/teacher/enroll-student - `{student_id, course_id}`
pub async fn enroll_student(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    payload: Result<Json<EnrollmentRequest>, JsonRejection>,
) -> ApiResult<MessageWith<EnrollmentCreated>> {
    let (student_id, course_id) = json_body(payload)?.ids()?;
    let enrollment = EnrollmentService::new(&state)
        .enroll(&user, student_id, course_id)
        .await?;
    Ok(ApiResponse::created(MessageWith::new(
        "Student enrolled successfully",
        EnrollmentCreated {
            enrollment: EnrollmentView::from(&enrollment),
        },
    )))
}

/// POST|DELETE /api/teacher/remove-student - `{student_id, course_id}`
pub async fn remove_student(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    payload: Result<Json<EnrollmentRequest>, JsonRejection>,
) -> ApiResult<Message> {
    let (student_id, course_id) = json_body(payload)?.ids()?;
    EnrollmentService::new(&state)
        .unenroll(&user, student_id, course_id)
        .await?;
    Ok(ApiResponse::success(Message::new("Student removed from course successfully")))
}

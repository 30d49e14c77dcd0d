//! Who may enroll or unenroll whom. Shared by the admin and teacher endpoints.

use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::can_manage_course;
use crate::database::models::{Enrollment, Role, User};
use crate::database::{Store, StoreError};
use crate::error::ApiError;
use crate::notify::{Task, TaskQueue};

use super::courses::COURSE_NOT_FOUND;
use super::validation::{Validator, REQUIRED};

pub const NOT_ASSIGNED_TO_COURSE: &str = "You are not assigned to this course.";
pub const NOT_A_STUDENT: &str = "User is not a student.";
pub const STUDENT_DISABLED: &str = "Student account is disabled.";
pub const ALREADY_ENROLLED: &str = "Student is already enrolled in this course.";
pub const NOT_ENROLLED: &str = "Student is not enrolled in this course.";

#[derive(Debug, Default, Deserialize)]
pub struct EnrollmentRequest {
    pub student_id: Option<Uuid>,
    pub course_id: Option<Uuid>,
}

impl EnrollmentRequest {
    /// `(student_id, course_id)`, or field errors for whichever is missing
    pub fn ids(&self) -> Result<(Uuid, Uuid), ApiError> {
        let mut v = Validator::new();
        if self.student_id.is_none() {
            v.add("student_id", REQUIRED);
        }
        if self.course_id.is_none() {
            v.add("course_id", REQUIRED);
        }
        v.finish()?;
        match (self.student_id, self.course_id) {
            (Some(student_id), Some(course_id)) => Ok((student_id, course_id)),
            _ => Err(ApiError::bad_request("Invalid input.")),
        }
    }
}

pub struct EnrollmentService {
    store: Arc<dyn Store>,
    tasks: TaskQueue,
}

impl EnrollmentService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            tasks: state.tasks.clone(),
        }
    }

    pub async fn enroll(&self, actor: &User, student_id: Uuid, course_id: Uuid) -> Result<Enrollment, ApiError> {
        self.authorize(actor, course_id).await?;

        let student = self.store.user_by_id(student_id).await?;
        let student = match student {
            Some(user) if user.role == Role::Student => user,
            _ => return Err(ApiError::field("student_id", NOT_A_STUDENT)),
        };
        if !student.is_active {
            return Err(ApiError::field("student_id", STUDENT_DISABLED));
        }

        if self.store.enrollment(student_id, course_id).await?.is_some() {
            return Err(ApiError::conflict(ALREADY_ENROLLED));
        }
        // The unique constraint settles a race between two concurrent enrollments
        let enrollment = self
            .store
            .insert_enrollment(student_id, course_id)
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => ApiError::conflict(ALREADY_ENROLLED),
                other => other.into(),
            })?;
        tracing::info!("{} enrolled {} in course {}", actor.username, student.username, course_id);

        self.tasks.enqueue(Task::SendEnrollment { student_id, course_id });
        Ok(enrollment)
    }

    pub async fn unenroll(&self, actor: &User, student_id: Uuid, course_id: Uuid) -> Result<(), ApiError> {
        self.authorize(actor, course_id).await?;

        if self.store.enrollment(student_id, course_id).await?.is_none() {
            return Err(ApiError::not_found(NOT_ENROLLED));
        }
        match self.store.delete_enrollment(student_id, course_id).await {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => return Err(ApiError::not_found(NOT_ENROLLED)),
            Err(e) => return Err(e.into()),
        }
        tracing::info!("{} unenrolled {} from course {}", actor.username, student_id, course_id);

        self.tasks.enqueue(Task::SendUnenrollment { student_id, course_id });
        Ok(())
    }

    /// Permission first, then existence: an unassigned teacher learns nothing
    /// about whether the course exists.
    async fn authorize(&self, actor: &User, course_id: Uuid) -> Result<(), ApiError> {
        if !can_manage_course(self.store.as_ref(), actor, course_id).await? {
            return Err(match actor.role {
                Role::Teacher => ApiError::forbidden(NOT_ASSIGNED_TO_COURSE),
                _ => ApiError::permission_denied(),
            });
        }
        if self.store.course_by_id(course_id).await?.is_none() {
            return Err(ApiError::not_found(COURSE_NOT_FOUND));
        }
        Ok(())
    }
}

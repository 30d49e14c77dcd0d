use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::{
    Course, CourseSchedule, CourseTeacher, Enrollment, NewCourse, NewNotification, NewSchedule,
    NewUser, Notification, Role, User,
};

/// Unique constraint names shared by the Postgres schema and the in-memory store
pub mod constraints {
    pub const USERS_USERNAME: &str = "users_username_key";
    pub const USERS_EMAIL: &str = "users_email_key";
    pub const COURSES_TITLE: &str = "courses_title_key";
    pub const COURSE_TEACHERS_PAIR: &str = "course_teachers_course_teacher_key";
    pub const ENROLLMENTS_PAIR: &str = "enrollments_student_course_key";
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// A unique constraint rejected the write. Carries the constraint name.
    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    #[error("Integrity error: {0}")]
    Integrity(String),

    #[error(transparent)]
    Database(#[from] crate::database::manager::DatabaseError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Single-row persistence operations used by the services.
///
/// Implementations must enforce the unique pairs listed in [`constraints`] and
/// cascade deletes of users and courses to their dependent rows.
#[async_trait]
pub trait Store: Send + Sync {
    // Users
    async fn insert_user(&self, new: NewUser) -> StoreResult<User>;
    async fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    async fn list_users(&self, role: Option<Role>) -> StoreResult<Vec<User>>;
    async fn update_user(&self, user: &User) -> StoreResult<User>;
    async fn delete_user(&self, id: Uuid) -> StoreResult<()>;

    // Courses
    async fn insert_course(&self, new: NewCourse) -> StoreResult<Course>;
    async fn course_by_id(&self, id: Uuid) -> StoreResult<Option<Course>>;
    async fn course_by_title(&self, title: &str) -> StoreResult<Option<Course>>;
    async fn list_courses(&self) -> StoreResult<Vec<Course>>;
    async fn update_course(&self, course: &Course) -> StoreResult<Course>;
    async fn delete_course(&self, id: Uuid) -> StoreResult<()>;

    // Teacher assignments
    async fn assign_teacher(&self, course_id: Uuid, teacher_id: Uuid) -> StoreResult<CourseTeacher>;
    async fn unassign_teacher(&self, course_id: Uuid, teacher_id: Uuid) -> StoreResult<()>;
    async fn is_teacher_assigned(&self, course_id: Uuid, teacher_id: Uuid) -> StoreResult<bool>;
    async fn course_teachers(&self, course_id: Uuid) -> StoreResult<Vec<User>>;
    async fn teacher_courses(&self, teacher_id: Uuid) -> StoreResult<Vec<Course>>;

    // Enrollments
    async fn insert_enrollment(&self, student_id: Uuid, course_id: Uuid) -> StoreResult<Enrollment>;
    async fn delete_enrollment(&self, student_id: Uuid, course_id: Uuid) -> StoreResult<()>;
    async fn enrollment(&self, student_id: Uuid, course_id: Uuid) -> StoreResult<Option<Enrollment>>;
    async fn course_students(&self, course_id: Uuid) -> StoreResult<Vec<User>>;
    async fn student_courses(&self, student_id: Uuid) -> StoreResult<Vec<Course>>;

    // Schedules
    async fn insert_schedule(&self, new: NewSchedule) -> StoreResult<CourseSchedule>;
    async fn schedule_by_id(&self, id: Uuid) -> StoreResult<Option<CourseSchedule>>;
    async fn course_schedules(&self, course_id: Uuid) -> StoreResult<Vec<CourseSchedule>>;
    async fn update_schedule(&self, schedule: &CourseSchedule) -> StoreResult<CourseSchedule>;
    async fn delete_schedule(&self, id: Uuid) -> StoreResult<()>;

    // Notifications
    async fn insert_notification(&self, new: NewNotification) -> StoreResult<Notification>;
    async fn notifications_for(&self, recipient_id: Uuid, unread_only: bool) -> StoreResult<Vec<Notification>>;
    async fn mark_notification_read(&self, id: Uuid, recipient_id: Uuid) -> StoreResult<Notification>;

    async fn health_check(&self) -> StoreResult<()>;
}

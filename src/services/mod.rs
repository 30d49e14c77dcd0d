// Business rules behind the handlers. Each service is built from the shared
// AppState per request and returns ApiError on failure.

pub mod accounts;
pub mod courses;
pub mod enrollment;
pub mod notifications;
pub mod schedules;
pub mod validation;

pub use accounts::AccountService;
pub use courses::CourseService;
pub use enrollment::EnrollmentService;
pub use notifications::NotificationService;
pub use schedules::ScheduleService;

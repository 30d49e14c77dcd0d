pub mod course;
pub mod enrollment;
pub mod notification;
pub mod schedule;
pub mod user;

pub use course::{Course, CourseTeacher, NewCourse};
pub use enrollment::Enrollment;
pub use notification::{NewNotification, Notification, NotificationKind};
pub use schedule::{CourseSchedule, NewSchedule, Weekday};
pub use user::{NewUser, Role, User};

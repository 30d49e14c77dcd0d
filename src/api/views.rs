// Response shapes. Each role sees its own projection of the same rows.

use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::database::models::{Course, CourseSchedule, Enrollment, Notification, NotificationKind, Role, User, Weekday};

/// Minimal identity returned by login and account provisioning
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Full account as seen by admins
#[derive(Debug, Clone, Serialize)]
pub struct UserDetail {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub department: Option<String>,
    pub enrollment_year: Option<i32>,
    pub batch: Option<String>,
    pub roll_number: Option<String>,
    pub is_active: bool,
    pub is_staff: bool,
    pub joined_date: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&User> for UserDetail {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role,
            department: user.department.clone(),
            enrollment_year: user.enrollment_year,
            batch: user.batch.clone(),
            roll_number: user.roll_number.clone(),
            is_active: user.is_active,
            is_staff: user.is_staff,
            joined_date: user.joined_date,
            last_login: user.last_login,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TeacherProfile {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub department: Option<String>,
    pub role: Role,
}

impl From<&User> for TeacherProfile {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            department: user.department.clone(),
            role: user.role,
        }
    }
}

/// Student's own profile. The password is accepted on write but never returned.
#[derive(Debug, Clone, Serialize)]
pub struct StudentProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub enrollment_year: Option<i32>,
    pub batch: Option<String>,
    pub roll_number: Option<String>,
}

impl From<&User> for StudentProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            enrollment_year: user.enrollment_year,
            batch: user.batch.clone(),
            roll_number: user.roll_number.clone(),
        }
    }
}

/// Teacher or student as listed inside a course
#[derive(Debug, Clone, Serialize)]
pub struct PersonBrief {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl From<&User> for PersonBrief {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleView {
    pub id: Uuid,
    pub course_id: Uuid,
    pub day_of_week: Weekday,
    pub day_of_week_display: &'static str,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub location: String,
    pub teacher_id: Option<Uuid>,
    pub teacher_name: Option<String>,
}

impl ScheduleView {
    /// `teachers` resolves teacher ids to usernames
    pub fn new(schedule: &CourseSchedule, teachers: &HashMap<Uuid, String>) -> Self {
        Self {
            id: schedule.id,
            course_id: schedule.course_id,
            day_of_week: schedule.day_of_week,
            day_of_week_display: schedule.day_of_week.display_name(),
            start_time: schedule.start_time,
            end_time: schedule.end_time,
            location: schedule.location.clone(),
            teacher_id: schedule.teacher_id,
            teacher_name: schedule.teacher_id.and_then(|id| teachers.get(&id).cloned()),
        }
    }
}

/// A weekly slot flattened across every course a student takes
#[derive(Debug, Clone, Serialize)]
pub struct TimetableEntry {
    pub course_title: String,
    #[serde(flatten)]
    pub slot: ScheduleView,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub duration: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Course> for CourseView {
    fn from(course: &Course) -> Self {
        Self {
            id: course.id,
            title: course.title.clone(),
            description: course.description.clone(),
            duration: course.duration.clone(),
            created_at: course.created_at,
            updated_at: course.updated_at,
        }
    }
}

/// Course with its teachers and weekly schedule
#[derive(Debug, Clone, Serialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: CourseView,
    pub teachers: Vec<PersonBrief>,
    pub schedules: Vec<ScheduleView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_count: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseRoster {
    #[serde(flatten)]
    pub course: CourseView,
    pub students: Vec<PersonBrief>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentView {
    pub id: Uuid,
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub enrolled_at: DateTime<Utc>,
}

impl From<&Enrollment> for EnrollmentView {
    fn from(enrollment: &Enrollment) -> Self {
        Self {
            id: enrollment.id,
            student_id: enrollment.student_id,
            course_id: enrollment.course_id,
            enrolled_at: enrollment.enrolled_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentCreated {
    pub enrollment: EnrollmentView,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationView {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub subject: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Notification> for NotificationView {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id,
            kind: n.kind,
            subject: n.subject.clone(),
            message: n.message.clone(),
            is_read: n.is_read,
            created_at: n.created_at,
        }
    }
}

/// Bare `{message}` body for deletions and other mutations with nothing to return
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// `{message, ...}` body used by the mutation endpoints
#[derive(Debug, Clone, Serialize)]
pub struct MessageWith<T: Serialize> {
    pub message: String,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> MessageWith<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::user_fixture;

    #[test]
    fn password_hash_never_serializes() {
        let mut user = user_fixture("amy", Role::Student);
        user.password_hash = "$2b$04$secret".to_string();

        let raw = serde_json::to_value(&user).unwrap();
        assert!(raw.get("password_hash").is_none());

        let profile = serde_json::to_value(StudentProfile::from(&user)).unwrap();
        assert!(profile.get("password").is_none());
        assert_eq!(profile["username"], "amy");
    }

    #[test]
    fn schedule_view_resolves_teacher_name() {
        let teacher = user_fixture("tina", Role::Teacher);
        let schedule = CourseSchedule {
            id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            teacher_id: Some(teacher.id),
            day_of_week: Weekday::Monday,
            start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            location: "Room 4".to_string(),
        };
        let names = HashMap::from([(teacher.id, teacher.username.clone())]);

        let view = serde_json::to_value(ScheduleView::new(&schedule, &names)).unwrap();
        assert_eq!(view["day_of_week"], 0);
        assert_eq!(view["day_of_week_display"], "Monday");
        assert_eq!(view["teacher_name"], "tina");
        assert_eq!(view["start_time"], "08:00:00");
    }

    #[test]
    fn message_with_flattens_payload() {
        #[derive(Serialize)]
        struct Payload {
            user: UserSummary,
        }
        let user = user_fixture("amy", Role::Student);
        let value = serde_json::to_value(MessageWith::new(
            "User created successfully",
            Payload { user: UserSummary::from(&user) },
        ))
        .unwrap();
        assert_eq!(value["message"], "User created successfully");
        assert_eq!(value["user"]["role"], "student");
    }
}

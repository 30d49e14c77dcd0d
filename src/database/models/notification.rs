use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    AccountCreated,
    Enrolled,
    Unenrolled,
    StudentEnrolled,
    StudentUnenrolled,
    TeacherAssigned,
    ScheduleChanged,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::AccountCreated => "account_created",
            NotificationKind::Enrolled => "enrolled",
            NotificationKind::Unenrolled => "unenrolled",
            NotificationKind::StudentEnrolled => "student_enrolled",
            NotificationKind::StudentUnenrolled => "student_unenrolled",
            NotificationKind::TeacherAssigned => "teacher_assigned",
            NotificationKind::ScheduleChanged => "schedule_changed",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "account_created" => Ok(NotificationKind::AccountCreated),
            "enrolled" => Ok(NotificationKind::Enrolled),
            "unenrolled" => Ok(NotificationKind::Unenrolled),
            "student_enrolled" => Ok(NotificationKind::StudentEnrolled),
            "student_unenrolled" => Ok(NotificationKind::StudentUnenrolled),
            "teacher_assigned" => Ok(NotificationKind::TeacherAssigned),
            "schedule_changed" => Ok(NotificationKind::ScheduleChanged),
            other => Err(format!("unknown notification kind '{}'", other)),
        }
    }
}

/// In-app copy of a mail sent to a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    pub subject: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    pub subject: String,
    pub message: String,
}

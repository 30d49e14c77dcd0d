use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub duration: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCourse {
    pub title: String,
    pub description: String,
    pub duration: String,
}

/// Teacher-to-course assignment, unique per (course, teacher)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseTeacher {
    pub course_id: Uuid,
    pub teacher_id: Uuid,
    pub assigned_at: DateTime<Utc>,
}

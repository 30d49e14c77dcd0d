use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::models::{
    Course, CourseSchedule, CourseTeacher, Enrollment, NewCourse, NewNotification, NewSchedule,
    NewUser, Notification, Role, User,
};
use crate::database::store::{constraints, Store, StoreError, StoreResult};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    courses: HashMap<Uuid, Course>,
    course_teachers: Vec<CourseTeacher>,
    enrollments: Vec<Enrollment>,
    schedules: HashMap<Uuid, CourseSchedule>,
    notifications: Vec<Notification>,
}

impl Tables {
    fn check_user_unique(&self, id: Uuid, username: &str, email: &str) -> StoreResult<()> {
        for other in self.users.values().filter(|u| u.id != id) {
            if other.username == username {
                return Err(StoreError::Conflict(constraints::USERS_USERNAME.to_string()));
            }
            if other.email == email {
                return Err(StoreError::Conflict(constraints::USERS_EMAIL.to_string()));
            }
        }
        Ok(())
    }

    fn check_course_unique(&self, id: Uuid, title: &str) -> StoreResult<()> {
        if self.courses.values().any(|c| c.id != id && c.title == title) {
            return Err(StoreError::Conflict(constraints::COURSES_TITLE.to_string()));
        }
        Ok(())
    }

    fn check_schedule_refs(&self, schedule_course: Uuid, teacher: Option<Uuid>) -> StoreResult<()> {
        if !self.courses.contains_key(&schedule_course) {
            return Err(StoreError::Integrity(format!("course {} does not exist", schedule_course)));
        }
        if let Some(teacher_id) = teacher {
            if !self.users.contains_key(&teacher_id) {
                return Err(StoreError::Integrity(format!("user {} does not exist", teacher_id)));
            }
        }
        Ok(())
    }

    fn sorted_users(&self, ids: impl Iterator<Item = Uuid>) -> Vec<User> {
        let mut users: Vec<User> = ids.filter_map(|id| self.users.get(&id).cloned()).collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users
    }

    fn sorted_courses(&self, ids: impl Iterator<Item = Uuid>) -> Vec<Course> {
        let mut courses: Vec<Course> = ids.filter_map(|id| self.courses.get(&id).cloned()).collect();
        courses.sort_by(|a, b| a.title.cmp(&b.title));
        courses
    }
}

/// Process-local store with the same constraint semantics as the Postgres schema.
/// Backs the test suite and `serve --memory`.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, new: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        let id = Uuid::new_v4();
        tables.check_user_unique(id, &new.username, &new.email)?;

        let user = User {
            id,
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            first_name: new.first_name,
            last_name: new.last_name,
            role: new.role,
            department: new.department,
            enrollment_year: new.enrollment_year,
            batch: new.batch,
            roll_number: new.roll_number,
            is_active: true,
            is_staff: new.is_staff,
            joined_date: Utc::now(),
            last_login: None,
        };
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn list_users(&self, role: Option<Role>) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        let ids = tables
            .users
            .values()
            .filter(|u| role.map_or(true, |r| u.role == r))
            .map(|u| u.id)
            .collect::<Vec<_>>();
        Ok(tables.sorted_users(ids.into_iter()))
    }

    async fn update_user(&self, user: &User) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user.id) {
            return Err(StoreError::NotFound(format!("user {}", user.id)));
        }
        tables.check_user_unique(user.id, &user.username, &user.email)?;
        tables.users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(&id).is_none() {
            return Err(StoreError::NotFound(format!("user {}", id)));
        }
        tables.course_teachers.retain(|ct| ct.teacher_id != id);
        tables.enrollments.retain(|e| e.student_id != id);
        tables.notifications.retain(|n| n.recipient_id != id);
        for schedule in tables.schedules.values_mut() {
            if schedule.teacher_id == Some(id) {
                schedule.teacher_id = None;
            }
        }
        Ok(())
    }

    async fn insert_course(&self, new: NewCourse) -> StoreResult<Course> {
        let mut tables = self.tables.write().await;
        let id = Uuid::new_v4();
        tables.check_course_unique(id, &new.title)?;

        let now = Utc::now();
        let course = Course {
            id,
            title: new.title,
            description: new.description,
            duration: new.duration,
            created_at: now,
            updated_at: now,
        };
        tables.courses.insert(id, course.clone());
        Ok(course)
    }

    async fn course_by_id(&self, id: Uuid) -> StoreResult<Option<Course>> {
        Ok(self.tables.read().await.courses.get(&id).cloned())
    }

    async fn course_by_title(&self, title: &str) -> StoreResult<Option<Course>> {
        let tables = self.tables.read().await;
        Ok(tables.courses.values().find(|c| c.title == title).cloned())
    }

    async fn list_courses(&self) -> StoreResult<Vec<Course>> {
        let tables = self.tables.read().await;
        let ids = tables.courses.keys().copied().collect::<Vec<_>>();
        Ok(tables.sorted_courses(ids.into_iter()))
    }

    async fn update_course(&self, course: &Course) -> StoreResult<Course> {
        let mut tables = self.tables.write().await;
        if !tables.courses.contains_key(&course.id) {
            return Err(StoreError::NotFound(format!("course {}", course.id)));
        }
        tables.check_course_unique(course.id, &course.title)?;

        let mut updated = course.clone();
        updated.updated_at = Utc::now();
        tables.courses.insert(course.id, updated.clone());
        Ok(updated)
    }

    async fn delete_course(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.courses.remove(&id).is_none() {
            return Err(StoreError::NotFound(format!("course {}", id)));
        }
        tables.course_teachers.retain(|ct| ct.course_id != id);
        tables.enrollments.retain(|e| e.course_id != id);
        tables.schedules.retain(|_, s| s.course_id != id);
        Ok(())
    }

    async fn assign_teacher(&self, course_id: Uuid, teacher_id: Uuid) -> StoreResult<CourseTeacher> {
        let mut tables = self.tables.write().await;
        if !tables.courses.contains_key(&course_id) || !tables.users.contains_key(&teacher_id) {
            return Err(StoreError::Integrity("assignment references a missing row".to_string()));
        }
        if tables
            .course_teachers
            .iter()
            .any(|ct| ct.course_id == course_id && ct.teacher_id == teacher_id)
        {
            return Err(StoreError::Conflict(constraints::COURSE_TEACHERS_PAIR.to_string()));
        }

        let assignment = CourseTeacher { course_id, teacher_id, assigned_at: Utc::now() };
        tables.course_teachers.push(assignment.clone());
        Ok(assignment)
    }

    async fn unassign_teacher(&self, course_id: Uuid, teacher_id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let before = tables.course_teachers.len();
        tables
            .course_teachers
            .retain(|ct| !(ct.course_id == course_id && ct.teacher_id == teacher_id));
        if tables.course_teachers.len() == before {
            return Err(StoreError::NotFound("teacher assignment".to_string()));
        }
        Ok(())
    }

    async fn is_teacher_assigned(&self, course_id: Uuid, teacher_id: Uuid) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .course_teachers
            .iter()
            .any(|ct| ct.course_id == course_id && ct.teacher_id == teacher_id))
    }

    async fn course_teachers(&self, course_id: Uuid) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        let ids = tables
            .course_teachers
            .iter()
            .filter(|ct| ct.course_id == course_id)
            .map(|ct| ct.teacher_id)
            .collect::<Vec<_>>();
        Ok(tables.sorted_users(ids.into_iter()))
    }

    async fn teacher_courses(&self, teacher_id: Uuid) -> StoreResult<Vec<Course>> {
        let tables = self.tables.read().await;
        let ids = tables
            .course_teachers
            .iter()
            .filter(|ct| ct.teacher_id == teacher_id)
            .map(|ct| ct.course_id)
            .collect::<Vec<_>>();
        Ok(tables.sorted_courses(ids.into_iter()))
    }

    async fn insert_enrollment(&self, student_id: Uuid, course_id: Uuid) -> StoreResult<Enrollment> {
        let mut tables = self.tables.write().await;
        if !tables.courses.contains_key(&course_id) || !tables.users.contains_key(&student_id) {
            return Err(StoreError::Integrity("enrollment references a missing row".to_string()));
        }
        if tables
            .enrollments
            .iter()
            .any(|e| e.student_id == student_id && e.course_id == course_id)
        {
            return Err(StoreError::Conflict(constraints::ENROLLMENTS_PAIR.to_string()));
        }

        let enrollment = Enrollment {
            id: Uuid::new_v4(),
            student_id,
            course_id,
            enrolled_at: Utc::now(),
        };
        tables.enrollments.push(enrollment.clone());
        Ok(enrollment)
    }

    async fn delete_enrollment(&self, student_id: Uuid, course_id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let before = tables.enrollments.len();
        tables
            .enrollments
            .retain(|e| !(e.student_id == student_id && e.course_id == course_id));
        if tables.enrollments.len() == before {
            return Err(StoreError::NotFound("enrollment".to_string()));
        }
        Ok(())
    }

    async fn enrollment(&self, student_id: Uuid, course_id: Uuid) -> StoreResult<Option<Enrollment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .enrollments
            .iter()
            .find(|e| e.student_id == student_id && e.course_id == course_id)
            .cloned())
    }

    async fn course_students(&self, course_id: Uuid) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        let ids = tables
            .enrollments
            .iter()
            .filter(|e| e.course_id == course_id)
            .map(|e| e.student_id)
            .collect::<Vec<_>>();
        Ok(tables.sorted_users(ids.into_iter()))
    }

    async fn student_courses(&self, student_id: Uuid) -> StoreResult<Vec<Course>> {
        let tables = self.tables.read().await;
        let ids = tables
            .enrollments
            .iter()
            .filter(|e| e.student_id == student_id)
            .map(|e| e.course_id)
            .collect::<Vec<_>>();
        Ok(tables.sorted_courses(ids.into_iter()))
    }

    async fn insert_schedule(&self, new: NewSchedule) -> StoreResult<CourseSchedule> {
        let mut tables = self.tables.write().await;
        tables.check_schedule_refs(new.course_id, new.teacher_id)?;

        let schedule = CourseSchedule {
            id: Uuid::new_v4(),
            course_id: new.course_id,
            teacher_id: new.teacher_id,
            day_of_week: new.day_of_week,
            start_time: new.start_time,
            end_time: new.end_time,
            location: new.location,
        };
        tables.schedules.insert(schedule.id, schedule.clone());
        Ok(schedule)
    }

    async fn schedule_by_id(&self, id: Uuid) -> StoreResult<Option<CourseSchedule>> {
        Ok(self.tables.read().await.schedules.get(&id).cloned())
    }

    async fn course_schedules(&self, course_id: Uuid) -> StoreResult<Vec<CourseSchedule>> {
        let tables = self.tables.read().await;
        let mut schedules: Vec<CourseSchedule> = tables
            .schedules
            .values()
            .filter(|s| s.course_id == course_id)
            .cloned()
            .collect();
        schedules.sort_by_key(|s| (s.day_of_week, s.start_time));
        Ok(schedules)
    }

    async fn update_schedule(&self, schedule: &CourseSchedule) -> StoreResult<CourseSchedule> {
        let mut tables = self.tables.write().await;
        if !tables.schedules.contains_key(&schedule.id) {
            return Err(StoreError::NotFound(format!("schedule {}", schedule.id)));
        }
        tables.check_schedule_refs(schedule.course_id, schedule.teacher_id)?;
        tables.schedules.insert(schedule.id, schedule.clone());
        Ok(schedule.clone())
    }

    async fn delete_schedule(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        match tables.schedules.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(format!("schedule {}", id))),
        }
    }

    async fn insert_notification(&self, new: NewNotification) -> StoreResult<Notification> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&new.recipient_id) {
            return Err(StoreError::Integrity(format!("user {} does not exist", new.recipient_id)));
        }

        let notification = Notification {
            id: Uuid::new_v4(),
            recipient_id: new.recipient_id,
            kind: new.kind,
            subject: new.subject,
            message: new.message,
            is_read: false,
            created_at: Utc::now(),
        };
        tables.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn notifications_for(&self, recipient_id: Uuid, unread_only: bool) -> StoreResult<Vec<Notification>> {
        let tables = self.tables.read().await;
        // Insertion order is creation order; newest first
        Ok(tables
            .notifications
            .iter()
            .rev()
            .filter(|n| n.recipient_id == recipient_id && (!unread_only || !n.is_read))
            .cloned()
            .collect())
    }

    async fn mark_notification_read(&self, id: Uuid, recipient_id: Uuid) -> StoreResult<Notification> {
        let mut tables = self.tables.write().await;
        let notification = tables
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.recipient_id == recipient_id)
            .ok_or_else(|| StoreError::NotFound(format!("notification {}", id)))?;
        notification.is_read = true;
        Ok(notification.clone())
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::views::{CourseDetail, CourseRoster, CourseView, PersonBrief, ScheduleView, TimetableEntry};
use crate::app::AppState;
use crate::database::models::{Course, CourseSchedule, CourseTeacher, NewCourse, Role, User};
use crate::database::store::constraints;
use crate::database::{Store, StoreError};
use crate::error::ApiError;
use crate::notify::{Task, TaskQueue};

use super::validation::{Validator, DURATION_MAX, TITLE_MAX};

pub const COURSE_NOT_FOUND: &str = "Course not found.";
pub const TITLE_TAKEN: &str = "Course with this title already exists.";
pub const NOT_A_TEACHER: &str = "User is not a teacher.";
pub const ALREADY_ASSIGNED: &str = "Teacher is already assigned to this course.";
pub const NOT_ASSIGNED: &str = "Teacher is not assigned to this course.";

#[derive(Debug, Default, Deserialize)]
pub struct CourseRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignTeacherRequest {
    pub teacher_id: Uuid,
}

/// Courses, teacher assignments and the per-role course views
pub struct CourseService {
    store: Arc<dyn Store>,
    tasks: TaskQueue,
}

impl CourseService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            tasks: state.tasks.clone(),
        }
    }

    pub async fn create_course(&self, request: CourseRequest) -> Result<Course, ApiError> {
        let mut v = Validator::new();
        let title = v.required("title", request.title.as_deref());
        if let Some(title) = &title {
            v.max_len("title", title, TITLE_MAX);
            if self.store.course_by_title(title).await?.is_some() {
                v.add("title", TITLE_TAKEN);
            }
        }
        v.max_len_opt("duration", request.duration.as_deref(), DURATION_MAX);
        v.finish()?;
        let Some(title) = title else {
            return Err(ApiError::field("title", super::validation::REQUIRED));
        };

        let course = self
            .store
            .insert_course(NewCourse {
                title,
                description: request.description.unwrap_or_default().trim().to_string(),
                duration: request.duration.unwrap_or_default().trim().to_string(),
            })
            .await
            .map_err(course_conflict)?;
        tracing::info!("Created course {}", course.title);
        Ok(course)
    }

    pub async fn list_courses(&self) -> Result<Vec<Course>, ApiError> {
        Ok(self.store.list_courses().await?)
    }

    pub async fn get_course(&self, id: Uuid) -> Result<Course, ApiError> {
        self.store
            .course_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found(COURSE_NOT_FOUND))
    }

    /// Course with teachers, schedules and the number of enrolled students
    pub async fn course_detail(&self, id: Uuid) -> Result<CourseDetail, ApiError> {
        let course = self.get_course(id).await?;
        let count = self.store.course_students(id).await?.len();
        self.detail(&course, Some(count)).await
    }

    pub async fn update_course(&self, id: Uuid, request: CourseRequest) -> Result<Course, ApiError> {
        let mut course = self.get_course(id).await?;

        let mut v = Validator::new();
        if request.title.is_some() {
            if let Some(title) = v.required("title", request.title.as_deref()) {
                v.max_len("title", &title, TITLE_MAX);
                if let Some(other) = self.store.course_by_title(&title).await? {
                    if other.id != course.id {
                        v.add("title", TITLE_TAKEN);
                    }
                }
                course.title = title;
            }
        }
        v.max_len_opt("duration", request.duration.as_deref(), DURATION_MAX);
        v.finish()?;

        if let Some(description) = request.description {
            course.description = description.trim().to_string();
        }
        if let Some(duration) = request.duration {
            course.duration = duration.trim().to_string();
        }

        Ok(self.store.update_course(&course).await.map_err(course_conflict)?)
    }

    pub async fn delete_course(&self, id: Uuid) -> Result<(), ApiError> {
        match self.store.delete_course(id).await {
            Ok(()) => {
                tracing::info!("Deleted course {}", id);
                Ok(())
            }
            Err(StoreError::NotFound(_)) => Err(ApiError::not_found(COURSE_NOT_FOUND)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn assign_teacher(&self, course_id: Uuid, teacher_id: Uuid) -> Result<CourseTeacher, ApiError> {
        self.get_course(course_id).await?;
        let teacher = self.store.user_by_id(teacher_id).await?;
        if !matches!(&teacher, Some(user) if user.role == Role::Teacher) {
            return Err(ApiError::field("teacher_id", NOT_A_TEACHER));
        }

        let assignment = self
            .store
            .assign_teacher(course_id, teacher_id)
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => ApiError::conflict(ALREADY_ASSIGNED),
                other => other.into(),
            })?;
        tracing::info!("Assigned teacher {} to course {}", teacher_id, course_id);

        self.tasks.enqueue(Task::SendTeacherAssignment { teacher_id, course_id });
        Ok(assignment)
    }

    pub async fn unassign_teacher(&self, course_id: Uuid, teacher_id: Uuid) -> Result<(), ApiError> {
        self.get_course(course_id).await?;
        match self.store.unassign_teacher(course_id, teacher_id).await {
            Ok(()) => {
                tracing::info!("Unassigned teacher {} from course {}", teacher_id, course_id);
                Ok(())
            }
            Err(StoreError::NotFound(_)) => Err(ApiError::not_found(NOT_ASSIGNED)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn course_students(&self, course_id: Uuid) -> Result<Vec<User>, ApiError> {
        self.get_course(course_id).await?;
        Ok(self.store.course_students(course_id).await?)
    }

    /// Courses the teacher is assigned to, with co-teachers and schedules
    pub async fn assigned_courses(&self, teacher: &User) -> Result<Vec<CourseDetail>, ApiError> {
        let mut details = Vec::new();
        for course in self.store.teacher_courses(teacher.id).await? {
            let count = self.store.course_students(course.id).await?.len();
            details.push(self.detail(&course, Some(count)).await?);
        }
        Ok(details)
    }

    pub async fn courses_with_students(&self, teacher: &User) -> Result<Vec<CourseRoster>, ApiError> {
        let mut rosters = Vec::new();
        for course in self.store.teacher_courses(teacher.id).await? {
            let students = self.store.course_students(course.id).await?;
            rosters.push(CourseRoster {
                course: CourseView::from(&course),
                students: students.iter().map(PersonBrief::from).collect(),
            });
        }
        Ok(rosters)
    }

    pub async fn enrolled_courses(&self, student: &User) -> Result<Vec<CourseDetail>, ApiError> {
        let mut details = Vec::new();
        for course in self.store.student_courses(student.id).await? {
            details.push(self.detail(&course, None).await?);
        }
        Ok(details)
    }

    /// Every session of every enrolled course, ordered through the week
    pub async fn weekly_schedule(&self, student: &User) -> Result<Vec<TimetableEntry>, ApiError> {
        let mut entries = Vec::new();
        for course in self.store.student_courses(student.id).await? {
            let schedules = self.store.course_schedules(course.id).await?;
            let names = self.teacher_names(&schedules, &[]).await?;
            entries.extend(schedules.iter().map(|slot| TimetableEntry {
                course_title: course.title.clone(),
                slot: ScheduleView::new(slot, &names),
            }));
        }
        entries.sort_by_key(|e| (i16::from(e.slot.day_of_week), e.slot.start_time));
        Ok(entries)
    }

    /// Read models for `schedules`, with teacher usernames resolved
    pub async fn schedule_views(&self, schedules: &[CourseSchedule]) -> Result<Vec<ScheduleView>, ApiError> {
        let names = self.teacher_names(schedules, &[]).await?;
        Ok(schedules.iter().map(|s| ScheduleView::new(s, &names)).collect())
    }

    async fn detail(&self, course: &Course, student_count: Option<usize>) -> Result<CourseDetail, ApiError> {
        let teachers = self.store.course_teachers(course.id).await?;
        let schedules = self.store.course_schedules(course.id).await?;
        let names = self.teacher_names(&schedules, &teachers).await?;

        Ok(CourseDetail {
            course: CourseView::from(course),
            teachers: teachers.iter().map(PersonBrief::from).collect(),
            schedules: schedules.iter().map(|s| ScheduleView::new(s, &names)).collect(),
            student_count,
        })
    }

    /// Usernames for the teachers referenced by `schedules`. A slot may name a
    /// teacher who has since been unassigned, so misses fall back to the store.
    async fn teacher_names(
        &self,
        schedules: &[CourseSchedule],
        known: &[User],
    ) -> Result<HashMap<Uuid, String>, ApiError> {
        let mut names: HashMap<Uuid, String> = known.iter().map(|u| (u.id, u.username.clone())).collect();
        for teacher_id in schedules.iter().filter_map(|s| s.teacher_id) {
            if names.contains_key(&teacher_id) {
                continue;
            }
            if let Some(user) = self.store.user_by_id(teacher_id).await? {
                names.insert(user.id, user.username);
            }
        }
        Ok(names)
    }
}

fn course_conflict(err: StoreError) -> ApiError {
    match err {
        StoreError::Conflict(c) if c == constraints::COURSES_TITLE => ApiError::field("title", TITLE_TAKEN),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::models::{NewSchedule, NewUser, Weekday};
    use crate::database::MemoryStore;
    use crate::notify::TaskReceiver;
    use axum::http::StatusCode;
    use chrono::NaiveTime;

    fn service() -> (CourseService, Arc<MemoryStore>, TaskReceiver) {
        let store = Arc::new(MemoryStore::new());
        let (tasks, rx) = TaskQueue::new();
        let state = AppState::new(store.clone(), tasks, AppConfig::for_tests());
        (CourseService::new(&state), store, rx)
    }

    fn titled(title: &str) -> CourseRequest {
        CourseRequest {
            title: Some(title.to_string()),
            description: Some("Intro".to_string()),
            duration: Some("12 weeks".to_string()),
        }
    }

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[tokio::test]
    async fn duplicate_titles_are_rejected() {
        let (svc, _store, _rx) = service();
        svc.create_course(titled("Physics")).await.unwrap();

        let err = svc.create_course(titled("Physics")).await.unwrap_err();
        assert_eq!(err.message(), TITLE_TAKEN);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let chem = svc.create_course(titled("Chemistry")).await.unwrap();
        let err = svc.update_course(chem.id, titled("Physics")).await.unwrap_err();
        assert_eq!(err.message(), TITLE_TAKEN);
    }

    #[tokio::test]
    async fn duration_is_limited_to_fifty_characters() {
        let (svc, store, _rx) = service();
        let mut request = titled("Physics");
        request.duration = Some("w".repeat(DURATION_MAX + 1));
        let err = svc.create_course(request).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "Ensure this field has no more than 50 characters.");
        assert!(store.course_by_title("Physics").await.unwrap().is_none());

        let course = svc.create_course(titled("Physics")).await.unwrap();
        let err = svc
            .update_course(
                course.id,
                CourseRequest {
                    duration: Some("w".repeat(DURATION_MAX + 1)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Ensure this field has no more than 50 characters.");
        assert_eq!(svc.get_course(course.id).await.unwrap().duration, "12 weeks");
    }

    #[tokio::test]
    async fn assigning_requires_a_teacher_and_is_unique() {
        let (svc, store, mut rx) = service();
        let course = svc.create_course(titled("Physics")).await.unwrap();
        let tina = store
            .insert_user(NewUser::new("tina", "tina@example.com", Role::Teacher))
            .await
            .unwrap();
        let sam = store
            .insert_user(NewUser::new("sam", "sam@example.com", Role::Student))
            .await
            .unwrap();

        let err = svc.assign_teacher(course.id, sam.id).await.unwrap_err();
        assert_eq!(err.message(), NOT_A_TEACHER);

        svc.assign_teacher(course.id, tina.id).await.unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            Task::SendTeacherAssignment { teacher_id: tina.id, course_id: course.id }
        );

        let err = svc.assign_teacher(course.id, tina.id).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(rx.try_recv().is_err());

        svc.unassign_teacher(course.id, tina.id).await.unwrap();
        let err = svc.unassign_teacher(course.id, tina.id).await.unwrap_err();
        assert_eq!(err.message(), NOT_ASSIGNED);
    }

    #[tokio::test]
    async fn student_views_carry_teachers_and_sorted_timetable() {
        let (svc, store, _rx) = service();
        let physics = svc.create_course(titled("Physics")).await.unwrap();
        let art = svc.create_course(titled("Art")).await.unwrap();
        let tina = store
            .insert_user(NewUser::new("tina", "tina@example.com", Role::Teacher))
            .await
            .unwrap();
        let sam = store
            .insert_user(NewUser::new("sam", "sam@example.com", Role::Student))
            .await
            .unwrap();
        store.assign_teacher(physics.id, tina.id).await.unwrap();
        store.insert_enrollment(sam.id, physics.id).await.unwrap();
        store.insert_enrollment(sam.id, art.id).await.unwrap();

        for (course_id, day, start) in [
            (physics.id, Weekday::Wednesday, at(10, 0)),
            (art.id, Weekday::Monday, at(14, 0)),
            (physics.id, Weekday::Monday, at(9, 0)),
        ] {
            store
                .insert_schedule(NewSchedule {
                    course_id,
                    teacher_id: (course_id == physics.id).then_some(tina.id),
                    day_of_week: day,
                    start_time: start,
                    end_time: start + chrono::Duration::hours(1),
                    location: "Room 1".into(),
                })
                .await
                .unwrap();
        }

        let courses = svc.enrolled_courses(&sam).await.unwrap();
        assert_eq!(courses.len(), 2);
        let physics_view = courses.iter().find(|c| c.course.id == physics.id).unwrap();
        assert_eq!(physics_view.teachers[0].username, "tina");
        assert_eq!(physics_view.schedules[0].teacher_name.as_deref(), Some("tina"));
        assert!(physics_view.student_count.is_none());

        let week = svc.weekly_schedule(&sam).await.unwrap();
        let order: Vec<_> = week
            .iter()
            .map(|e| (e.course_title.as_str(), e.slot.day_of_week, e.slot.start_time))
            .collect();
        assert_eq!(
            order,
            vec![
                ("Physics", Weekday::Monday, at(9, 0)),
                ("Art", Weekday::Monday, at(14, 0)),
                ("Physics", Weekday::Wednesday, at(10, 0)),
            ]
        );
    }

    #[tokio::test]
    async fn teacher_sees_only_assigned_courses_with_rosters() {
        let (svc, store, _rx) = service();
        let physics = svc.create_course(titled("Physics")).await.unwrap();
        svc.create_course(titled("Art")).await.unwrap();
        let tina = store
            .insert_user(NewUser::new("tina", "tina@example.com", Role::Teacher))
            .await
            .unwrap();
        let sam = store
            .insert_user(NewUser::new("sam", "sam@example.com", Role::Student))
            .await
            .unwrap();
        store.assign_teacher(physics.id, tina.id).await.unwrap();
        store.insert_enrollment(sam.id, physics.id).await.unwrap();

        let assigned = svc.assigned_courses(&tina).await.unwrap();
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].student_count, Some(1));

        let rosters = svc.courses_with_students(&tina).await.unwrap();
        assert_eq!(rosters[0].students[0].username, "sam");
    }
}

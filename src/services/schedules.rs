use chrono::NaiveTime;
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{CourseSchedule, NewSchedule, Weekday};
use crate::database::{Store, StoreError};
use crate::error::ApiError;
use crate::notify::{Task, TaskQueue};

use super::courses::COURSE_NOT_FOUND;
use super::validation::{Validator, LOCATION_MAX, REQUIRED};

pub const SCHEDULE_NOT_FOUND: &str = "Schedule not found.";
pub const END_BEFORE_START: &str = "End time must be after start time.";
pub const TEACHER_NOT_ASSIGNED: &str = "Teacher must be assigned to this course.";

/// Create or edit a weekly session. Times are `HH:MM` or `HH:MM:SS`.
/// `teacher_id` is `None` when absent and `Some(None)` when sent as null.
#[derive(Debug, Default, Deserialize)]
pub struct ScheduleRequest {
    #[serde(default, deserialize_with = "present")]
    pub teacher_id: Option<Option<Uuid>>,
    pub day_of_week: Option<i64>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: Option<String>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub struct ScheduleService {
    store: Arc<dyn Store>,
    tasks: TaskQueue,
}

impl ScheduleService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            tasks: state.tasks.clone(),
        }
    }

    pub async fn list(&self, course_id: Uuid) -> Result<Vec<CourseSchedule>, ApiError> {
        self.require_course(course_id).await?;
        Ok(self.store.course_schedules(course_id).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<CourseSchedule, ApiError> {
        self.store
            .schedule_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found(SCHEDULE_NOT_FOUND))
    }

    pub async fn create(&self, course_id: Uuid, request: ScheduleRequest) -> Result<CourseSchedule, ApiError> {
        self.require_course(course_id).await?;

        let mut v = Validator::new();
        let day_of_week = match request.day_of_week {
            Some(raw) => parse_day(&mut v, raw),
            None => {
                v.add("day_of_week", REQUIRED);
                None
            }
        };
        let start_time = required_time(&mut v, "start_time", request.start_time.as_deref());
        let end_time = required_time(&mut v, "end_time", request.end_time.as_deref());
        let location = v.required("location", request.location.as_deref());
        if let Some(location) = &location {
            v.max_len("location", location, LOCATION_MAX);
        }
        if let (Some(start), Some(end)) = (start_time, end_time) {
            check_order(&mut v, start, end);
        }
        let teacher_id = request.teacher_id.flatten();
        self.check_teacher(&mut v, course_id, teacher_id).await?;
        v.finish()?;

        let (Some(day_of_week), Some(start_time), Some(end_time), Some(location)) =
            (day_of_week, start_time, end_time, location)
        else {
            return Err(ApiError::bad_request("Invalid input."));
        };

        let schedule = self
            .store
            .insert_schedule(NewSchedule {
                course_id,
                teacher_id,
                day_of_week,
                start_time,
                end_time,
                location,
            })
            .await?;
        tracing::info!(
            "Scheduled course {} on {} {}-{}",
            course_id,
            day_of_week.display_name(),
            start_time,
            end_time
        );

        self.tasks.enqueue(Task::SendScheduleChange { course_id });
        Ok(schedule)
    }

    /// Partial update; absent fields keep their current value
    pub async fn update(&self, id: Uuid, request: ScheduleRequest) -> Result<CourseSchedule, ApiError> {
        let mut schedule = self.get(id).await?;

        let mut v = Validator::new();
        if let Some(raw) = request.day_of_week {
            if let Some(day) = parse_day(&mut v, raw) {
                schedule.day_of_week = day;
            }
        }
        if request.start_time.is_some() {
            if let Some(start) = required_time(&mut v, "start_time", request.start_time.as_deref()) {
                schedule.start_time = start;
            }
        }
        if request.end_time.is_some() {
            if let Some(end) = required_time(&mut v, "end_time", request.end_time.as_deref()) {
                schedule.end_time = end;
            }
        }
        if request.location.is_some() {
            if let Some(location) = v.required("location", request.location.as_deref()) {
                v.max_len("location", &location, LOCATION_MAX);
                schedule.location = location;
            }
        }
        match request.teacher_id {
            Some(Some(teacher_id)) => {
                self.check_teacher(&mut v, schedule.course_id, Some(teacher_id)).await?;
                schedule.teacher_id = Some(teacher_id);
            }
            Some(None) => schedule.teacher_id = None,
            None => {}
        }
        check_order(&mut v, schedule.start_time, schedule.end_time);
        v.finish()?;

        let schedule = self.store.update_schedule(&schedule).await?;
        self.tasks.enqueue(Task::SendScheduleChange { course_id: schedule.course_id });
        Ok(schedule)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        let schedule = self.get(id).await?;
        match self.store.delete_schedule(id).await {
            Ok(()) => {
                self.tasks.enqueue(Task::SendScheduleChange { course_id: schedule.course_id });
                Ok(())
            }
            Err(StoreError::NotFound(_)) => Err(ApiError::not_found(SCHEDULE_NOT_FOUND)),
            Err(e) => Err(e.into()),
        }
    }

    async fn require_course(&self, course_id: Uuid) -> Result<(), ApiError> {
        match self.store.course_by_id(course_id).await? {
            Some(_) => Ok(()),
            None => Err(ApiError::not_found(COURSE_NOT_FOUND)),
        }
    }

    async fn check_teacher(&self, v: &mut Validator, course_id: Uuid, teacher_id: Option<Uuid>) -> Result<(), ApiError> {
        if let Some(teacher_id) = teacher_id {
            if !self.store.is_teacher_assigned(course_id, teacher_id).await? {
                v.add("teacher_id", TEACHER_NOT_ASSIGNED);
            }
        }
        Ok(())
    }
}

fn parse_day(v: &mut Validator, raw: i64) -> Option<Weekday> {
    match i16::try_from(raw).ok().and_then(|d| Weekday::try_from(d).ok()) {
        Some(day) => Some(day),
        None => {
            v.add("day_of_week", format!("\"{}\" is not a valid choice.", raw));
            None
        }
    }
}

fn required_time(v: &mut Validator, field: &str, value: Option<&str>) -> Option<NaiveTime> {
    let raw = v.required(field, value)?;
    match parse_time(&raw) {
        Some(time) => Some(time),
        None => {
            v.add(field, "Time has wrong format. Use one of these formats instead: hh:mm[:ss].");
            None
        }
    }
}

fn check_order(v: &mut Validator, start: NaiveTime, end: NaiveTime) {
    if start >= end {
        v.add("non_field_errors", END_BEFORE_START);
    }
}

pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::{
    Course, CourseSchedule, CourseTeacher, Enrollment, NewCourse, NewNotification, NewSchedule,
    NewUser, Notification, NotificationKind, Role, User, Weekday,
};
use crate::database::store::{Store, StoreError, StoreResult};

const USER_COLUMNS: &str = "u.id, u.username, u.email, u.password_hash, u.first_name, u.last_name, \
     u.role, u.department, u.enrollment_year, u.batch, u.roll_number, u.is_active, u.is_staff, \
     u.joined_date, u.last_login";

const COURSE_COLUMNS: &str = "c.id, c.title, c.description, c.duration, c.created_at, c.updated_at";

const SCHEDULE_COLUMNS: &str = "id, course_id, teacher_id, day_of_week, start_time, end_time, location";

const NOTIFICATION_COLUMNS: &str = "id, recipient_id, kind, subject, message, is_read, created_at";

/// Map driver errors onto store semantics. Unique violations carry the constraint name.
fn map_err(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let constraint = db_err.constraint().unwrap_or("unique").to_string();
            return StoreError::Conflict(constraint);
        }
        if db_err.is_foreign_key_violation() || db_err.is_check_violation() {
            return StoreError::Integrity(db_err.message().to_string());
        }
    }
    StoreError::Database(DatabaseError::Sqlx(err))
}

fn decode_err(column: &str, message: String) -> StoreError {
    StoreError::Database(DatabaseError::QueryError(format!("column '{}': {}", column, message)))
}

fn user_from_row(row: &PgRow) -> StoreResult<User> {
    let role: String = row.try_get("role").map_err(map_err)?;
    Ok(User {
        id: row.try_get("id").map_err(map_err)?,
        username: row.try_get("username").map_err(map_err)?,
        email: row.try_get("email").map_err(map_err)?,
        password_hash: row.try_get("password_hash").map_err(map_err)?,
        first_name: row.try_get("first_name").map_err(map_err)?,
        last_name: row.try_get("last_name").map_err(map_err)?,
        role: role.parse::<Role>().map_err(|e| decode_err("role", e))?,
        department: row.try_get("department").map_err(map_err)?,
        enrollment_year: row.try_get("enrollment_year").map_err(map_err)?,
        batch: row.try_get("batch").map_err(map_err)?,
        roll_number: row.try_get("roll_number").map_err(map_err)?,
        is_active: row.try_get("is_active").map_err(map_err)?,
        is_staff: row.try_get("is_staff").map_err(map_err)?,
        joined_date: row.try_get("joined_date").map_err(map_err)?,
        last_login: row.try_get("last_login").map_err(map_err)?,
    })
}

fn course_from_row(row: &PgRow) -> StoreResult<Course> {
    Ok(Course {
        id: row.try_get("id").map_err(map_err)?,
        title: row.try_get("title").map_err(map_err)?,
        description: row.try_get("description").map_err(map_err)?,
        duration: row.try_get("duration").map_err(map_err)?,
        created_at: row.try_get("created_at").map_err(map_err)?,
        updated_at: row.try_get("updated_at").map_err(map_err)?,
    })
}

fn schedule_from_row(row: &PgRow) -> StoreResult<CourseSchedule> {
    let day: i16 = row.try_get("day_of_week").map_err(map_err)?;
    Ok(CourseSchedule {
        id: row.try_get("id").map_err(map_err)?,
        course_id: row.try_get("course_id").map_err(map_err)?,
        teacher_id: row.try_get("teacher_id").map_err(map_err)?,
        day_of_week: Weekday::try_from(day).map_err(|e| decode_err("day_of_week", e))?,
        start_time: row.try_get("start_time").map_err(map_err)?,
        end_time: row.try_get("end_time").map_err(map_err)?,
        location: row.try_get("location").map_err(map_err)?,
    })
}

fn enrollment_from_row(row: &PgRow) -> StoreResult<Enrollment> {
    Ok(Enrollment {
        id: row.try_get("id").map_err(map_err)?,
        student_id: row.try_get("student_id").map_err(map_err)?,
        course_id: row.try_get("course_id").map_err(map_err)?,
        enrolled_at: row.try_get("enrolled_at").map_err(map_err)?,
    })
}

fn notification_from_row(row: &PgRow) -> StoreResult<Notification> {
    let kind: String = row.try_get("kind").map_err(map_err)?;
    Ok(Notification {
        id: row.try_get("id").map_err(map_err)?,
        recipient_id: row.try_get("recipient_id").map_err(map_err)?,
        kind: kind.parse::<NotificationKind>().map_err(|e| decode_err("kind", e))?,
        subject: row.try_get("subject").map_err(map_err)?,
        message: row.try_get("message").map_err(map_err)?,
        is_read: row.try_get("is_read").map_err(map_err)?,
        created_at: row.try_get("created_at").map_err(map_err)?,
    })
}

fn collect<T>(rows: Vec<PgRow>, f: fn(&PgRow) -> StoreResult<T>) -> StoreResult<Vec<T>> {
    rows.iter().map(f).collect()
}

/// PostgreSQL-backed store. Constraints and cascades live in `schema.sql`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_user(&self, new: NewUser) -> StoreResult<User> {
        let query = format!(
            "INSERT INTO users AS u (id, username, email, password_hash, first_name, last_name, role, \
             department, enrollment_year, batch, roll_number, is_staff) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING {}",
            USER_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(&new.username)
            .bind(&new.email)
            .bind(&new.password_hash)
            .bind(&new.first_name)
            .bind(&new.last_name)
            .bind(new.role.as_str())
            .bind(&new.department)
            .bind(new.enrollment_year)
            .bind(&new.batch)
            .bind(&new.roll_number)
            .bind(new.is_staff)
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)?;
        user_from_row(&row)
    }

    async fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let query = format!("SELECT {} FROM users u WHERE u.id = $1", USER_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let query = format!("SELECT {} FROM users u WHERE u.email = $1", USER_COLUMNS);
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let query = format!("SELECT {} FROM users u WHERE u.username = $1", USER_COLUMNS);
        let row = sqlx::query(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn list_users(&self, role: Option<Role>) -> StoreResult<Vec<User>> {
        let query = format!(
            "SELECT {} FROM users u WHERE ($1::text IS NULL OR u.role = $1) ORDER BY u.username",
            USER_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(role.map(|r| r.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;
        collect(rows, user_from_row)
    }

    async fn update_user(&self, user: &User) -> StoreResult<User> {
        let query = format!(
            "UPDATE users AS u SET username = $2, email = $3, password_hash = $4, first_name = $5, \
             last_name = $6, role = $7, department = $8, enrollment_year = $9, batch = $10, \
             roll_number = $11, is_active = $12, is_staff = $13, last_login = $14 \
             WHERE u.id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(user.id)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(user.role.as_str())
            .bind(&user.department)
            .bind(user.enrollment_year)
            .bind(&user.batch)
            .bind(&user.roll_number)
            .bind(user.is_active)
            .bind(user.is_staff)
            .bind(user.last_login)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        match row {
            Some(row) => user_from_row(&row),
            None => Err(StoreError::NotFound(format!("user {}", user.id))),
        }
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {}", id)));
        }
        Ok(())
    }

    async fn insert_course(&self, new: NewCourse) -> StoreResult<Course> {
        let query = format!(
            "INSERT INTO courses AS c (id, title, description, duration) VALUES ($1, $2, $3, $4) RETURNING {}",
            COURSE_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(&new.title)
            .bind(&new.description)
            .bind(&new.duration)
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)?;
        course_from_row(&row)
    }

    async fn course_by_id(&self, id: Uuid) -> StoreResult<Option<Course>> {
        let query = format!("SELECT {} FROM courses c WHERE c.id = $1", COURSE_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref().map(course_from_row).transpose()
    }

    async fn course_by_title(&self, title: &str) -> StoreResult<Option<Course>> {
        let query = format!("SELECT {} FROM courses c WHERE c.title = $1", COURSE_COLUMNS);
        let row = sqlx::query(&query)
            .bind(title)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref().map(course_from_row).transpose()
    }

    async fn list_courses(&self) -> StoreResult<Vec<Course>> {
        let query = format!("SELECT {} FROM courses c ORDER BY c.title", COURSE_COLUMNS);
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;
        collect(rows, course_from_row)
    }

    async fn update_course(&self, course: &Course) -> StoreResult<Course> {
        let query = format!(
            "UPDATE courses AS c SET title = $2, description = $3, duration = $4, updated_at = $5 \
             WHERE c.id = $1 RETURNING {}",
            COURSE_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(course.id)
            .bind(&course.title)
            .bind(&course.description)
            .bind(&course.duration)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        match row {
            Some(row) => course_from_row(&row),
            None => Err(StoreError::NotFound(format!("course {}", course.id))),
        }
    }

    async fn delete_course(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("course {}", id)));
        }
        Ok(())
    }

    async fn assign_teacher(&self, course_id: Uuid, teacher_id: Uuid) -> StoreResult<CourseTeacher> {
        let row = sqlx::query(
            "INSERT INTO course_teachers (course_id, teacher_id) VALUES ($1, $2) \
             RETURNING course_id, teacher_id, assigned_at",
        )
        .bind(course_id)
        .bind(teacher_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_err)?;

        Ok(CourseTeacher {
            course_id: row.try_get("course_id").map_err(map_err)?,
            teacher_id: row.try_get("teacher_id").map_err(map_err)?,
            assigned_at: row.try_get("assigned_at").map_err(map_err)?,
        })
    }

    async fn unassign_teacher(&self, course_id: Uuid, teacher_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM course_teachers WHERE course_id = $1 AND teacher_id = $2")
            .bind(course_id)
            .bind(teacher_id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("teacher assignment".to_string()));
        }
        Ok(())
    }

    async fn is_teacher_assigned(&self, course_id: Uuid, teacher_id: Uuid) -> StoreResult<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM course_teachers WHERE course_id = $1 AND teacher_id = $2)",
        )
        .bind(course_id)
        .bind(teacher_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(exists)
    }

    async fn course_teachers(&self, course_id: Uuid) -> StoreResult<Vec<User>> {
        let query = format!(
            "SELECT {} FROM users u JOIN course_teachers ct ON ct.teacher_id = u.id \
             WHERE ct.course_id = $1 ORDER BY u.username",
            USER_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(course_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;
        collect(rows, user_from_row)
    }

    async fn teacher_courses(&self, teacher_id: Uuid) -> StoreResult<Vec<Course>> {
        let query = format!(
            "SELECT {} FROM courses c JOIN course_teachers ct ON ct.course_id = c.id \
             WHERE ct.teacher_id = $1 ORDER BY c.title",
            COURSE_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(teacher_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;
        collect(rows, course_from_row)
    }

    async fn insert_enrollment(&self, student_id: Uuid, course_id: Uuid) -> StoreResult<Enrollment> {
        let row = sqlx::query(
            "INSERT INTO enrollments (id, student_id, course_id) VALUES ($1, $2, $3) \
             RETURNING id, student_id, course_id, enrolled_at",
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_err)?;
        enrollment_from_row(&row)
    }

    async fn delete_enrollment(&self, student_id: Uuid, course_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM enrollments WHERE student_id = $1 AND course_id = $2")
            .bind(student_id)
            .bind(course_id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("enrollment".to_string()));
        }
        Ok(())
    }

    async fn enrollment(&self, student_id: Uuid, course_id: Uuid) -> StoreResult<Option<Enrollment>> {
        let row = sqlx::query(
            "SELECT id, student_id, course_id, enrolled_at FROM enrollments \
             WHERE student_id = $1 AND course_id = $2",
        )
        .bind(student_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;
        row.as_ref().map(enrollment_from_row).transpose()
    }

    async fn course_students(&self, course_id: Uuid) -> StoreResult<Vec<User>> {
        let query = format!(
            "SELECT {} FROM users u JOIN enrollments e ON e.student_id = u.id \
             WHERE e.course_id = $1 ORDER BY u.username",
            USER_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(course_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;
        collect(rows, user_from_row)
    }

    async fn student_courses(&self, student_id: Uuid) -> StoreResult<Vec<Course>> {
        let query = format!(
            "SELECT {} FROM courses c JOIN enrollments e ON e.course_id = c.id \
             WHERE e.student_id = $1 ORDER BY c.title",
            COURSE_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(student_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;
        collect(rows, course_from_row)
    }

    async fn insert_schedule(&self, new: NewSchedule) -> StoreResult<CourseSchedule> {
        let query = format!(
            "INSERT INTO course_schedules (id, course_id, teacher_id, day_of_week, start_time, end_time, location) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            SCHEDULE_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(new.course_id)
            .bind(new.teacher_id)
            .bind(i16::from(new.day_of_week))
            .bind(new.start_time)
            .bind(new.end_time)
            .bind(&new.location)
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)?;
        schedule_from_row(&row)
    }

    async fn schedule_by_id(&self, id: Uuid) -> StoreResult<Option<CourseSchedule>> {
        let query = format!("SELECT {} FROM course_schedules WHERE id = $1", SCHEDULE_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref().map(schedule_from_row).transpose()
    }

    async fn course_schedules(&self, course_id: Uuid) -> StoreResult<Vec<CourseSchedule>> {
        let query = format!(
            "SELECT {} FROM course_schedules WHERE course_id = $1 ORDER BY day_of_week, start_time",
            SCHEDULE_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(course_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;
        collect(rows, schedule_from_row)
    }

    async fn update_schedule(&self, schedule: &CourseSchedule) -> StoreResult<CourseSchedule> {
        let query = format!(
            "UPDATE course_schedules SET teacher_id = $2, day_of_week = $3, start_time = $4, \
             end_time = $5, location = $6 WHERE id = $1 RETURNING {}",
            SCHEDULE_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(schedule.id)
            .bind(schedule.teacher_id)
            .bind(i16::from(schedule.day_of_week))
            .bind(schedule.start_time)
            .bind(schedule.end_time)
            .bind(&schedule.location)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        match row {
            Some(row) => schedule_from_row(&row),
            None => Err(StoreError::NotFound(format!("schedule {}", schedule.id))),
        }
    }

    async fn delete_schedule(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM course_schedules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("schedule {}", id)));
        }
        Ok(())
    }

    async fn insert_notification(&self, new: NewNotification) -> StoreResult<Notification> {
        let query = format!(
            "INSERT INTO notifications (id, recipient_id, kind, subject, message) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            NOTIFICATION_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(new.recipient_id)
            .bind(new.kind.as_str())
            .bind(&new.subject)
            .bind(&new.message)
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)?;
        notification_from_row(&row)
    }

    async fn notifications_for(&self, recipient_id: Uuid, unread_only: bool) -> StoreResult<Vec<Notification>> {
        let query = format!(
            "SELECT {} FROM notifications WHERE recipient_id = $1 AND (NOT $2 OR is_read = FALSE) \
             ORDER BY created_at DESC",
            NOTIFICATION_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(recipient_id)
            .bind(unread_only)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;
        collect(rows, notification_from_row)
    }

    async fn mark_notification_read(&self, id: Uuid, recipient_id: Uuid) -> StoreResult<Notification> {
        let query = format!(
            "UPDATE notifications SET is_read = TRUE WHERE id = $1 AND recipient_id = $2 RETURNING {}",
            NOTIFICATION_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(recipient_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        match row {
            Some(row) => notification_from_row(&row),
            None => Err(StoreError::NotFound(format!("notification {}", id))),
        }
    }

    async fn health_check(&self) -> StoreResult<()> {
        DatabaseManager::health_check(&self.pool).await?;
        Ok(())
    }
}

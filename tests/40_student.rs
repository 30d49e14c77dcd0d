mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use chrono::NaiveTime;
use serde_json::json;

use academy_api::database::models::{NewSchedule, Role, Weekday};
use academy_api::database::Store;
use common::{TestApp, PASSWORD};

fn at(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

async fn login(app: &TestApp, email: &str, password: &str) -> Result<StatusCode> {
    let (status, _) = app
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"email": email, "password": password})),
        )
        .await?;
    Ok(status)
}

#[tokio::test]
async fn profile_update_and_password_change() -> Result<()> {
    let app = TestApp::new();
    let sam = app.seed_user("sam", Role::Student).await?;
    let token = app.token(&sam)?;

    let (status, body) = app.get("/api/student/profile", &token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], sam.id.to_string());
    assert_eq!(body["data"]["first_name"], "Sam");

    // Blank password keeps the current one
    let (status, body) = app
        .put(
            "/api/student/profile",
            &token,
            json!({"first_name": "Samuel", "password": "", "username": "ignored"}),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["first_name"], "Samuel");
    assert_eq!(body["data"]["username"], "sam");
    assert_eq!(login(&app, "sam@example.com", PASSWORD).await?, StatusCode::OK);

    let (status, _) = app
        .request(
            Method::PATCH,
            "/api/student/profile",
            Some(&token),
            Some(json!({"password": "new-secret-42"})),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(login(&app, "sam@example.com", PASSWORD).await?, StatusCode::BAD_REQUEST);
    assert_eq!(login(&app, "sam@example.com", "new-secret-42").await?, StatusCode::OK);

    let (status, body) = app
        .put("/api/student/profile", &token, json!({"last_name": "x".repeat(31)}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["field_errors"]["last_name"].is_array());
    Ok(())
}

#[tokio::test]
async fn enrolled_courses_include_teachers_and_schedules() -> Result<()> {
    let app = TestApp::new();
    let sam = app.seed_user("sam", Role::Student).await?;
    let tina = app.seed_user("tina", Role::Teacher).await?;
    let physics = app.seed_course("Physics").await?;
    app.seed_course("Art").await?;
    app.store.assign_teacher(physics.id, tina.id).await?;
    app.store.insert_enrollment(sam.id, physics.id).await?;
    app.store
        .insert_schedule(NewSchedule {
            course_id: physics.id,
            teacher_id: Some(tina.id),
            day_of_week: Weekday::Thursday,
            start_time: at(13, 0),
            end_time: at(14, 30),
            location: "Hall B".into(),
        })
        .await?;
    let token = app.token(&sam)?;

    let (status, body) = app.get("/api/student/enrolled-courses", &token).await?;
    assert_eq!(status, StatusCode::OK);
    let courses = body["data"].as_array().unwrap();
    assert_eq!(courses.len(), 1);
    let course = &courses[0];
    assert_eq!(course["title"], "Physics");
    assert_eq!(course["teachers"][0]["username"], "tina");
    assert_eq!(course["schedules"][0]["day_of_week"], 3);
    assert_eq!(course["schedules"][0]["day_of_week_display"], "Thursday");
    assert_eq!(course["schedules"][0]["teacher_name"], "tina");
    assert!(course.get("student_count").is_none());
    Ok(())
}

#[tokio::test]
async fn weekly_schedule_is_ordered_through_the_week() -> Result<()> {
    let app = TestApp::new();
    let sam = app.seed_user("sam", Role::Student).await?;
    let physics = app.seed_course("Physics").await?;
    let art = app.seed_course("Art").await?;
    let music = app.seed_course("Music").await?;
    app.store.insert_enrollment(sam.id, physics.id).await?;
    app.store.insert_enrollment(sam.id, art.id).await?;

    for (course_id, day, start) in [
        (physics.id, Weekday::Friday, at(9, 0)),
        (art.id, Weekday::Monday, at(15, 0)),
        (physics.id, Weekday::Monday, at(8, 0)),
        (music.id, Weekday::Sunday, at(8, 0)),
    ] {
        app.store
            .insert_schedule(NewSchedule {
                course_id,
                teacher_id: None,
                day_of_week: day,
                start_time: start,
                end_time: start + chrono::Duration::minutes(50),
                location: "Room 2".into(),
            })
            .await?;
    }
    let token = app.token(&sam)?;

    let (status, body) = app.get("/api/student/schedule", &token).await?;
    assert_eq!(status, StatusCode::OK);
    let entries: Vec<(String, String, String)> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| {
            (
                e["course_title"].as_str().unwrap_or_default().to_string(),
                e["day_of_week_display"].as_str().unwrap_or_default().to_string(),
                e["start_time"].as_str().unwrap_or_default().to_string(),
            )
        })
        .collect();
    assert_eq!(
        entries,
        vec![
            ("Physics".to_string(), "Monday".to_string(), "08:00:00".to_string()),
            ("Art".to_string(), "Monday".to_string(), "15:00:00".to_string()),
            ("Physics".to_string(), "Friday".to_string(), "09:00:00".to_string()),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn students_cannot_manage_enrollments() -> Result<()> {
    let app = TestApp::new();
    let sam = app.seed_user("sam", Role::Student).await?;
    let course = app.seed_course("Physics").await?;
    let token = app.token(&sam)?;

    for uri in ["/api/teacher/enroll-student", "/api/admin/enrollments"] {
        let (status, _) = app
            .post(uri, &token, json!({"student_id": sam.id, "course_id": course.id}))
            .await?;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
    }
    assert!(app.store.enrollment(sam.id, course.id).await?.is_none());
    Ok(())
}

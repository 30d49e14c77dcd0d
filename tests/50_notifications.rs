mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{json, Value};

use academy_api::database::models::Role;
use academy_api::database::Store;
use common::TestApp;

#[tokio::test]
async fn enrollment_notifies_student_and_teachers_in_app() -> Result<()> {
    let mut app = TestApp::new();
    let tina = app.seed_user("tina", Role::Teacher).await?;
    let sam = app.seed_user("sam", Role::Student).await?;
    let course = app.seed_course("Geometry").await?;
    app.store.assign_teacher(course.id, tina.id).await?;

    let tina_token = app.token(&tina)?;
    let sam_token = app.token(&sam)?;
    let (status, _) = app
        .post(
            "/api/teacher/enroll-student",
            &tina_token,
            json!({"student_id": sam.id, "course_id": course.id}),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    // Nothing is recorded until the worker runs
    let (_, body) = app.get("/api/notifications", &sam_token).await?;
    assert_eq!(body["data"], json!([]));

    assert_eq!(app.run_tasks().await?, 1);

    let (status, body) = app.get("/api/notifications", &sam_token).await?;
    assert_eq!(status, StatusCode::OK);
    let notes = body["data"].as_array().unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0]["kind"], "enrolled");
    assert_eq!(notes[0]["subject"], "Enrolled in Geometry");
    assert_eq!(notes[0]["is_read"], false);

    let (_, body) = app.get("/api/notifications", &tina_token).await?;
    assert_eq!(body["data"][0]["kind"], "student_enrolled");
    Ok(())
}

#[tokio::test]
async fn only_the_recipient_marks_a_notification_read() -> Result<()> {
    let mut app = TestApp::new();
    let tina = app.seed_user("tina", Role::Teacher).await?;
    let otto = app.seed_user("otto", Role::Teacher).await?;
    let course = app.seed_course("Geometry").await?;

    let root = app.seed_user("root", Role::Admin).await?;
    let admin_token = app.token(&root)?;
    let (status, _) = app
        .post(
            &format!("/api/admin/courses/{}/teachers", course.id),
            &admin_token,
            json!({"teacher_id": tina.id}),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    app.run_tasks().await?;

    let tina_token = app.token(&tina)?;
    let (_, body) = app.get("/api/notifications?unread=true", &tina_token).await?;
    let note_id = body["data"][0]["id"].as_str().unwrap().to_string();
    let read_uri = format!("/api/notifications/{}/read", note_id);

    let (status, body) = app.post(&read_uri, &app.token(&otto)?, Value::Null).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Notification not found.");

    let (status, body) = app.post(&read_uri, &tina_token, Value::Null).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_read"], true);

    let (_, body) = app.get("/api/notifications?unread=true", &tina_token).await?;
    assert_eq!(body["data"], json!([]));
    let (_, body) = app.get("/api/notifications", &tina_token).await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    assert_eq!(app.store.notifications_for(tina.id, false).await?.len(), 1);
    Ok(())
}

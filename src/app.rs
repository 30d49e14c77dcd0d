use axum::{
    http::{HeaderValue, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{AppConfig, SecurityConfig};
use crate::database::Store;
use crate::handlers::{admin, protected, public, student, teacher};
use crate::middleware::{require_admin, require_auth, require_student, require_teacher};
use crate::notify::TaskQueue;

/// Shared request state. Cheap to clone; every field is reference counted.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub tasks: TaskQueue,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, tasks: TaskQueue, config: AppConfig) -> Self {
        Self {
            store,
            tasks,
            config: Arc::new(config),
        }
    }
}

pub fn app(state: AppState) -> Router {
    let protected = Router::new()
        .merge(auth_routes())
        .merge(notification_routes())
        .merge(admin_routes())
        .merge(teacher_routes())
        .merge(student_routes())
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_public_routes())
        // Protected API
        .merge(protected)
        // Global middleware
        .layer(cors_layer(&state.config.security))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn auth_public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(public::auth::login_post))
        .route("/auth/refresh", post(public::auth::refresh_post))
}

fn auth_routes() -> Router<AppState> {
    Router::new().route("/api/auth/whoami", get(protected::auth::whoami))
}

fn notification_routes() -> Router<AppState> {
    use protected::notifications;

    Router::new()
        .route("/api/notifications", get(notifications::list))
        .route("/api/notifications/:id/read", post(notifications::mark_read))
}

fn admin_routes() -> Router<AppState> {
    use admin::{courses, enrollments, schedules, users};

    Router::new()
        // Accounts
        .route("/api/admin/create-user", post(users::create))
        .route("/api/admin/users", get(users::list).post(users::create))
        .route(
            "/api/admin/users/:id",
            get(users::show)
                .put(users::update)
                .patch(users::update)
                .delete(users::delete),
        )
        // Courses
        .route("/api/admin/courses", get(courses::list).post(courses::create))
        .route(
            "/api/admin/courses/:id",
            get(courses::show)
                .put(courses::update)
                .patch(courses::update)
                .delete(courses::delete),
        )
        .route("/api/admin/courses/:id/teachers", post(courses::assign_teacher))
        .route(
            "/api/admin/courses/:id/teachers/:teacher_id",
            axum::routing::delete(courses::unassign_teacher),
        )
        .route("/api/admin/courses/:id/students", get(courses::students))
        .route(
            "/api/admin/courses/:id/schedules",
            get(schedules::list).post(schedules::create),
        )
        // Enrollments
        .route(
            "/api/admin/enrollments",
            post(enrollments::enroll).delete(enrollments::unenroll),
        )
        // Schedules
        .route(
            "/api/admin/schedules/:id",
            get(schedules::show)
                .put(schedules::update)
                .patch(schedules::update)
                .delete(schedules::delete),
        )
        .route_layer(from_fn(require_admin))
}

fn teacher_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/teacher/profile",
            get(teacher::profile_get)
                .put(teacher::profile_put)
                .patch(teacher::profile_patch),
        )
        .route("/api/teacher/assigned-courses", get(teacher::assigned_courses))
        .route("/api/teacher/courses-with-students", get(teacher::courses_with_students))
        .route("/api/teacher/enroll-student", post(teacher::enroll_student))
        .route(
            "/api/teacher/remove-student",
            post(teacher::remove_student).delete(teacher::remove_student),
        )
        .route_layer(from_fn(require_teacher))
}

fn student_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/student/profile",
            get(student::profile_get)
                .put(student::profile_put)
                .patch(student::profile_patch),
        )
        .route("/api/student/enrolled-courses", get(student::enrolled_courses))
        .route("/api/student/schedule", get(student::weekly_schedule))
        .route_layer(from_fn(require_student))
}

/// Permissive when no origins are configured, otherwise limited to the list
fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if !security.enable_cors {
        return CorsLayer::new();
    }
    if security.cors_origins.is_empty() || security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Academy API",
            "version": version,
            "description": "Role-based academic administration backend",
            "endpoints": {
                "home": "/ (public)",
                "public_auth": "/auth/login, /auth/refresh (public - token acquisition)",
                "auth": "/api/auth/whoami (protected)",
                "notifications": "/api/notifications[/:id/read] (protected)",
                "admin": "/api/admin/* (admin role)",
                "teacher": "/api/teacher/* (teacher role)",
                "student": "/api/student/* (student role)",
            }
        }
    }))
}

async fn health(axum::extract::State(state): axum::extract::State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}

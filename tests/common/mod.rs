#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use academy_api::app::{app, AppState};
use academy_api::auth::{hash_password, issue_token_pair};
use academy_api::config::AppConfig;
use academy_api::database::models::{Course, NewCourse, NewUser, Role, User};
use academy_api::database::{MemoryStore, Store};
use academy_api::notify::{MemoryMailer, NotificationWorker, TaskReceiver};

pub const PASSWORD: &str = "correct-horse";

/// The full router over an in-memory store. Tasks stay queued until
/// [`TestApp::run_tasks`] hands them to a worker.
pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub tasks: TaskReceiver,
    pub mailer: MemoryMailer,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let (queue, tasks) = academy_api::notify::TaskQueue::new();
        let state = AppState::new(store.clone(), queue, AppConfig::for_tests());
        Self {
            router: app(state.clone()),
            state,
            store,
            tasks,
            mailer: MemoryMailer::new(),
        }
    }

    pub async fn seed_user(&self, username: &str, role: Role) -> Result<User> {
        let hash = hash_password(PASSWORD, self.state.config.security.bcrypt_cost)?;
        let user = self
            .store
            .insert_user(
                NewUser::new(username, format!("{}@example.com", username), role)
                    .with_password_hash(hash)
                    .with_names(capitalize(username), "Tester"),
            )
            .await?;
        Ok(user)
    }

    pub async fn seed_course(&self, title: &str) -> Result<Course> {
        let course = self
            .store
            .insert_course(NewCourse {
                title: title.to_string(),
                description: format!("{} for beginners", title),
                duration: "12 weeks".to_string(),
            })
            .await?;
        Ok(course)
    }

    /// Access token minted directly, skipping the login round trip
    pub fn token(&self, user: &User) -> Result<String> {
        Ok(issue_token_pair(user, &self.state.config.security)?.access)
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&json)?)
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body)?)
            .await
            .context("router failed")?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).with_context(|| format!("non-JSON body from {}", uri))?
        };
        Ok((status, json))
    }

    pub async fn get(&self, uri: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    /// Run every queued task through a worker backed by [`TestApp::mailer`]
    pub async fn run_tasks(&mut self) -> Result<usize> {
        let worker = NotificationWorker::new(
            self.store.clone(),
            Arc::new(self.mailer.clone()),
            self.state.config.mail.from_address.clone(),
        );
        let mut count = 0;
        while let Ok(task) = self.tasks.try_recv() {
            worker.handle(task).await?;
            count += 1;
        }
        Ok(count)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

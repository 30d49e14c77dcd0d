use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::views::UserSummary;
use crate::app::AppState;
use crate::auth::{
    generate_password, hash_password_async, issue_access_token, issue_token_pair, validate_jwt,
    verify_password_async, TokenType,
};
use crate::config::AppConfig;
use crate::database::models::{NewUser, Role, User};
use crate::database::store::constraints;
use crate::database::{Store, StoreError};
use crate::error::ApiError;
use crate::notify::{Task, TaskQueue};

use super::validation::{
    blank_to_none, normalize_email, Validator, BATCH_MAX, DEPARTMENT_MAX, NAME_MAX, REQUIRED, ROLL_NUMBER_MAX,
};

pub const MISSING_CREDENTIALS: &str = "Must include email and password.";
pub const UNKNOWN_EMAIL: &str = "No user found with this email.";
pub const BAD_CREDENTIALS: &str = "Unable to login with provided credentials.";
pub const ACCOUNT_DISABLED: &str = "User account is disabled.";
pub const INVALID_ROLE: &str = "Role must be one of ['student', 'teacher']";
pub const USERNAME_TAKEN: &str = "Username already exists.";
pub const EMAIL_TAKEN: &str = "Email already exists.";
pub const PROFILE_USERNAME_TAKEN: &str = "A user with that username already exists.";

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub user: UserSummary,
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    pub refresh: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub department: Option<String>,
    pub enrollment_year: Option<i32>,
    pub batch: Option<String>,
    pub roll_number: Option<String>,
}

/// Admin edit of an account. Absent fields are left alone; blank optional text clears.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub department: Option<String>,
    pub enrollment_year: Option<i32>,
    pub batch: Option<String>,
    pub roll_number: Option<String>,
    pub is_active: Option<bool>,
}

/// Teacher self-edit. `email` and `role` are read-only and never deserialized.
#[derive(Debug, Default, Deserialize)]
pub struct TeacherProfileUpdate {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub department: Option<String>,
}

/// Student self-edit. A blank password leaves the current one in place.
#[derive(Debug, Default, Deserialize)]
pub struct StudentProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
}

/// Accounts, credentials and profiles
pub struct AccountService {
    store: Arc<dyn Store>,
    tasks: TaskQueue,
    config: Arc<AppConfig>,
}

impl AccountService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            tasks: state.tasks.clone(),
            config: state.config.clone(),
        }
    }

    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, ApiError> {
        let email = blank_to_none(request.email);
        let password = request.password.filter(|p| !p.is_empty());
        let (email, password) = match (email, password) {
            (Some(email), Some(password)) => (email, password),
            _ => return Err(ApiError::non_field(MISSING_CREDENTIALS)),
        };

        let mut user = self
            .store
            .user_by_email(&normalize_email(&email))
            .await?
            .ok_or_else(|| ApiError::non_field(UNKNOWN_EMAIL))?;

        if !verify_password_async(password, user.password_hash.clone()).await {
            tracing::info!("Failed login for {}", user.username);
            return Err(ApiError::non_field(BAD_CREDENTIALS));
        }
        if !user.is_active {
            return Err(ApiError::non_field(ACCOUNT_DISABLED));
        }

        let tokens = issue_token_pair(&user, &self.config.security)?;
        user.last_login = Some(Utc::now());
        let user = self.store.update_user(&user).await?;
        tracing::info!("User {} logged in", user.username);

        Ok(LoginResponse {
            message: "Login successful",
            user: UserSummary::from(&user),
            access: tokens.access,
            refresh: tokens.refresh,
        })
    }

    pub async fn refresh(&self, request: RefreshRequest) -> Result<RefreshResponse, ApiError> {
        let token = blank_to_none(request.refresh).ok_or_else(|| ApiError::field("refresh", REQUIRED))?;
        let claims = validate_jwt(&token, TokenType::Refresh, &self.config.security)?;

        let user = self
            .store
            .user_by_id(claims.sub)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| ApiError::unauthorized("User not found or inactive"))?;

        Ok(RefreshResponse {
            access: issue_access_token(&user, &self.config.security)?,
        })
    }

    /// Provision a student or teacher with a generated password and mail it out
    pub async fn create_user(&self, request: CreateUserRequest) -> Result<User, ApiError> {
        let mut v = Validator::new();
        let username = v.required("username", request.username.as_deref());
        let email = v.required("email", request.email.as_deref());
        let raw_role = request
            .role
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or("student");
        let role = match raw_role.parse::<Role>() {
            Ok(role) if Role::provisionable().contains(&role) => Some(role),
            _ => {
                v.add("role", INVALID_ROLE);
                None
            }
        };
        if let Some(username) = &username {
            v.username(username);
        }
        let email = email.map(|e| v.email(&e));
        check_names(&mut v, request.first_name.as_deref(), request.last_name.as_deref());
        check_academic(
            &mut v,
            request.department.as_deref(),
            request.batch.as_deref(),
            request.roll_number.as_deref(),
        );

        if let Some(username) = &username {
            if self.store.user_by_username(username).await?.is_some() {
                v.add("username", USERNAME_TAKEN);
            }
        }
        if let Some(email) = &email {
            if self.store.user_by_email(email).await?.is_some() {
                v.add("email", EMAIL_TAKEN);
            }
        }
        v.finish()?;

        let (Some(username), Some(email), Some(role)) = (username, email, role) else {
            return Err(ApiError::bad_request("Invalid input."));
        };

        let password = generate_password();
        let hash = hash_password_async(password.clone(), self.config.security.bcrypt_cost).await?;

        let mut new = NewUser::new(&username, &email, role)
            .with_password_hash(hash)
            .with_names(
                request.first_name.unwrap_or_default().trim(),
                request.last_name.unwrap_or_default().trim(),
            );
        new.department = blank_to_none(request.department);
        new.enrollment_year = request.enrollment_year;
        new.batch = blank_to_none(request.batch);
        new.roll_number = blank_to_none(request.roll_number);

        let user = self.store.insert_user(new).await.map_err(user_conflict)?;
        tracing::info!("Created {} account {}", user.role, user.username);

        self.tasks.enqueue(Task::SendUserCredentials {
            email: user.email.clone(),
            username: user.username.clone(),
            password,
        });
        Ok(user)
    }

    pub async fn list_users(&self, role: Option<&str>) -> Result<Vec<User>, ApiError> {
        let role = match role.map(str::trim).filter(|r| !r.is_empty()) {
            Some(raw) => Some(
                raw.parse::<Role>()
                    .map_err(|_| ApiError::field("role", format!("\"{}\" is not a valid role.", raw)))?,
            ),
            None => None,
        };
        Ok(self.store.list_users(role).await?)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User, ApiError> {
        self.store
            .user_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found."))
    }

    pub async fn update_user(&self, id: Uuid, request: UpdateUserRequest) -> Result<User, ApiError> {
        let mut user = self.get_user(id).await?;

        let mut v = Validator::new();
        check_names(&mut v, request.first_name.as_deref(), request.last_name.as_deref());
        check_academic(
            &mut v,
            request.department.as_deref(),
            request.batch.as_deref(),
            request.roll_number.as_deref(),
        );
        v.finish()?;

        if let Some(first_name) = request.first_name {
            user.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = request.last_name {
            user.last_name = last_name.trim().to_string();
        }
        if request.department.is_some() {
            user.department = blank_to_none(request.department);
        }
        if request.enrollment_year.is_some() {
            user.enrollment_year = request.enrollment_year;
        }
        if request.batch.is_some() {
            user.batch = blank_to_none(request.batch);
        }
        if request.roll_number.is_some() {
            user.roll_number = blank_to_none(request.roll_number);
        }
        if let Some(is_active) = request.is_active {
            user.is_active = is_active;
        }

        Ok(self.store.update_user(&user).await.map_err(user_conflict)?)
    }

    pub async fn delete_user(&self, actor: &User, id: Uuid) -> Result<(), ApiError> {
        if actor.id == id {
            return Err(ApiError::bad_request("You cannot delete your own account."));
        }
        match self.store.delete_user(id).await {
            Ok(()) => {
                tracing::info!("{} deleted user {}", actor.username, id);
                Ok(())
            }
            Err(StoreError::NotFound(_)) => Err(ApiError::not_found("User not found.")),
            Err(e) => Err(e.into()),
        }
    }

    /// PUT when `partial` is false: `username` must be present
    pub async fn update_teacher_profile(
        &self,
        teacher: &User,
        request: TeacherProfileUpdate,
        partial: bool,
    ) -> Result<User, ApiError> {
        let mut v = Validator::new();
        let username = match (&request.username, partial) {
            (None, true) => None,
            (value, _) => v.required("username", value.as_deref()),
        };
        if let Some(username) = &username {
            v.username(username);
            if let Some(other) = self.store.user_by_username(username).await? {
                if other.id != teacher.id {
                    v.add("username", PROFILE_USERNAME_TAKEN);
                }
            }
        }
        check_names(&mut v, request.first_name.as_deref(), request.last_name.as_deref());
        v.max_len_opt("department", request.department.as_deref(), DEPARTMENT_MAX);
        v.finish()?;

        let mut user = teacher.clone();
        if let Some(username) = username {
            user.username = username;
        }
        if let Some(first_name) = request.first_name {
            user.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = request.last_name {
            user.last_name = last_name.trim().to_string();
        }
        if request.department.is_some() {
            user.department = blank_to_none(request.department);
        }

        let user = self.store.update_user(&user).await.map_err(|e| match e {
            StoreError::Conflict(c) if c == constraints::USERS_USERNAME => {
                ApiError::field("username", PROFILE_USERNAME_TAKEN)
            }
            other => other.into(),
        })?;
        tracing::info!("Teacher {} updated their profile", user.username);
        Ok(user)
    }

    pub async fn update_student_profile(
        &self,
        student: &User,
        request: StudentProfileUpdate,
    ) -> Result<User, ApiError> {
        let mut v = Validator::new();
        check_names(&mut v, request.first_name.as_deref(), request.last_name.as_deref());
        v.finish()?;

        let mut user = student.clone();
        if let Some(first_name) = request.first_name {
            user.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = request.last_name {
            user.last_name = last_name.trim().to_string();
        }
        if let Some(password) = request.password.filter(|p| !p.is_empty()) {
            user.password_hash = hash_password_async(password, self.config.security.bcrypt_cost).await?;
            tracing::info!("Student {} changed their password", user.username);
        }

        Ok(self.store.update_user(&user).await?)
    }

    /// Create the admin account unless one with this username already exists.
    /// Returns the account and whether it was created.
    pub async fn ensure_admin(&self, username: &str, email: &str, password: &str) -> Result<(User, bool), ApiError> {
        if let Some(existing) = self.store.user_by_username(username).await? {
            if !existing.is_admin() {
                return Err(ApiError::conflict(format!("User {} exists and is not an admin", username)));
            }
            return Ok((existing, false));
        }

        let mut v = Validator::new();
        v.username(username);
        let email = v.email(email);
        if password.is_empty() {
            v.add("password", REQUIRED);
        }
        v.finish()?;

        let hash = hash_password_async(password.to_string(), self.config.security.bcrypt_cost).await?;
        let admin = self
            .store
            .insert_user(NewUser::new(username, email, Role::Admin).with_password_hash(hash))
            .await
            .map_err(user_conflict)?;
        tracing::info!("Created admin account {}", admin.username);
        Ok((admin, true))
    }
}

fn check_names(v: &mut Validator, first_name: Option<&str>, last_name: Option<&str>) {
    v.max_len_opt("first_name", first_name, NAME_MAX);
    v.max_len_opt("last_name", last_name, NAME_MAX);
}

fn check_academic(v: &mut Validator, department: Option<&str>, batch: Option<&str>, roll_number: Option<&str>) {
    v.max_len_opt("department", department, DEPARTMENT_MAX);
    v.max_len_opt("batch", batch, BATCH_MAX);
    v.max_len_opt("roll_number", roll_number, ROLL_NUMBER_MAX);
}

/// A concurrent insert that beat the pre-check still reads as a field error
fn user_conflict(err: StoreError) -> ApiError {
    match err {
        StoreError::Conflict(c) if c == constraints::USERS_USERNAME => ApiError::field("username", USERNAME_TAKEN),
        StoreError::Conflict(c) if c == constraints::USERS_EMAIL => ApiError::field("email", EMAIL_TAKEN),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::notify::TaskReceiver;

    fn service() -> (AccountService, Arc<MemoryStore>, TaskReceiver) {
        let store = Arc::new(MemoryStore::new());
        let (tasks, rx) = TaskQueue::new();
        let state = AppState::new(store.clone(), tasks, AppConfig::for_tests());
        (AccountService::new(&state), store, rx)
    }

    fn create_request(username: &str, email: &str, role: &str) -> CreateUserRequest {
        CreateUserRequest {
            username: Some(username.to_string()),
            email: Some(email.to_string()),
            role: Some(role.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn created_user_gets_credentials_task_with_working_password() {
        let (svc, _store, mut rx) = service();
        let user = svc
            .create_user(create_request("amy", "amy@Example.COM", "student"))
            .await
            .unwrap();
        assert_eq!(user.email, "amy@example.com");
        assert_eq!(user.role, Role::Student);
        assert!(!user.is_staff);

        let Ok(Task::SendUserCredentials { email, username, password }) = rx.try_recv() else {
            panic!("expected a credentials task");
        };
        assert_eq!((email.as_str(), username.as_str()), ("amy@example.com", "amy"));
        assert_eq!(password.len(), 8);

        let login = svc
            .login(LoginRequest {
                email: Some("amy@example.com".into()),
                password: Some(password),
            })
            .await
            .unwrap();
        assert_eq!(login.message, "Login successful");
        assert_eq!(login.user.username, "amy");
    }

    #[tokio::test]
    async fn admin_role_cannot_be_provisioned() {
        let (svc, _store, mut rx) = service();
        let err = svc
            .create_user(create_request("eve", "eve@example.com", "admin"))
            .await
            .unwrap_err();
        assert_eq!(err.message(), INVALID_ROLE);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn omitted_role_provisions_a_student() {
        let (svc, _store, mut rx) = service();
        let user = svc
            .create_user(CreateUserRequest {
                username: Some("rolf".into()),
                email: Some("rolf@example.com".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(user.role, Role::Student);
        assert!(matches!(rx.try_recv(), Ok(Task::SendUserCredentials { .. })));
    }

    #[tokio::test]
    async fn text_fields_respect_column_lengths() {
        let (svc, store, mut rx) = service();
        let err = svc
            .create_user(CreateUserRequest {
                batch: Some("b".repeat(BATCH_MAX + 1)),
                ..create_request("long", "long@example.com", "student")
            })
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Ensure this field has no more than 50 characters.");
        assert!(store.user_by_username("long").await.unwrap().is_none());
        assert!(rx.try_recv().is_err());

        let local = "a".repeat(250);
        let err = svc
            .create_user(create_request("long", &format!("{}@example.com", local), "student"))
            .await
            .unwrap_err();
        assert!(err.to_json()["field_errors"]["email"].is_array());

        let sam = svc
            .create_user(create_request("sam", "sam@example.com", "student"))
            .await
            .unwrap();
        let err = svc
            .update_user(
                sam.id,
                UpdateUserRequest {
                    department: Some("d".repeat(DEPARTMENT_MAX + 1)),
                    roll_number: Some("r".repeat(ROLL_NUMBER_MAX + 1)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        let body = err.to_json();
        assert_eq!(body["message"], "Invalid input.");
        assert!(body["field_errors"]["department"].is_array());
        assert!(body["field_errors"]["roll_number"].is_array());

        let tina = store
            .insert_user(NewUser::new("tina", "tina@example.com", Role::Teacher))
            .await
            .unwrap();
        let err = svc
            .update_teacher_profile(
                &tina,
                TeacherProfileUpdate {
                    department: Some("d".repeat(DEPARTMENT_MAX + 1)),
                    ..Default::default()
                },
                true,
            )
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Ensure this field has no more than 100 characters.");
        assert_eq!(store.user_by_id(tina.id).await.unwrap().unwrap().department, None);
    }

    #[tokio::test]
    async fn duplicate_username_and_email_are_both_reported() {
        let (svc, _store, _rx) = service();
        svc.create_user(create_request("amy", "amy@example.com", "teacher"))
            .await
            .unwrap();

        let err = svc
            .create_user(create_request("amy", "amy@example.com", "student"))
            .await
            .unwrap_err();
        let body = err.to_json();
        assert_eq!(body["field_errors"]["username"][0], USERNAME_TAKEN);
        assert_eq!(body["field_errors"]["email"][0], EMAIL_TAKEN);
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn login_error_messages() {
        let (svc, store, _rx) = service();
        let hash = crate::auth::hash_password("right-pass", 4).unwrap();
        let user = store
            .insert_user(NewUser::new("sam", "sam@example.com", Role::Student).with_password_hash(hash))
            .await
            .unwrap();

        let attempt = |email: Option<&str>, password: Option<&str>| LoginRequest {
            email: email.map(String::from),
            password: password.map(String::from),
        };

        let err = svc.login(attempt(Some("sam@example.com"), None)).await.unwrap_err();
        assert_eq!(err.message(), MISSING_CREDENTIALS);
        let err = svc.login(attempt(Some("nobody@example.com"), Some("x"))).await.unwrap_err();
        assert_eq!(err.message(), UNKNOWN_EMAIL);
        let err = svc.login(attempt(Some("sam@example.com"), Some("wrong"))).await.unwrap_err();
        assert_eq!(err.message(), BAD_CREDENTIALS);

        let mut disabled = user.clone();
        disabled.is_active = false;
        store.update_user(&disabled).await.unwrap();
        let err = svc.login(attempt(Some("sam@example.com"), Some("right-pass"))).await.unwrap_err();
        assert_eq!(err.message(), ACCOUNT_DISABLED);
    }

    #[tokio::test]
    async fn login_records_last_login_and_refresh_issues_access() {
        let (svc, store, _rx) = service();
        let hash = crate::auth::hash_password("pw", 4).unwrap();
        let user = store
            .insert_user(NewUser::new("tina", "tina@example.com", Role::Teacher).with_password_hash(hash))
            .await
            .unwrap();

        let login = svc
            .login(LoginRequest {
                email: Some("tina@example.com".into()),
                password: Some("pw".into()),
            })
            .await
            .unwrap();
        assert!(store.user_by_id(user.id).await.unwrap().unwrap().last_login.is_some());

        let refreshed = svc
            .refresh(RefreshRequest { refresh: Some(login.refresh) })
            .await
            .unwrap();
        assert!(!refreshed.access.is_empty());

        let err = svc
            .refresh(RefreshRequest { refresh: Some(login.access) })
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admins_cannot_delete_themselves() {
        let (svc, _store, _rx) = service();
        let (admin, created) = svc.ensure_admin("root", "root@example.com", "pw").await.unwrap();
        assert!(created);
        let err = svc.delete_user(&admin, admin.id).await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);

        let (again, created) = svc.ensure_admin("root", "root@example.com", "pw").await.unwrap();
        assert!(!created);
        assert_eq!(again.id, admin.id);
    }

    #[tokio::test]
    async fn teacher_profile_ignores_read_only_fields_and_keeps_username_unique() {
        let (svc, store, _rx) = service();
        let tina = store
            .insert_user(NewUser::new("tina", "tina@example.com", Role::Teacher))
            .await
            .unwrap();
        store
            .insert_user(NewUser::new("tom", "tom@example.com", Role::Teacher))
            .await
            .unwrap();

        let patch: TeacherProfileUpdate =
            serde_json::from_value(serde_json::json!({"department": "Physics", "email": "x@y.z", "role": "admin"}))
                .unwrap();
        let updated = svc.update_teacher_profile(&tina, patch, true).await.unwrap();
        assert_eq!(updated.department.as_deref(), Some("Physics"));
        assert_eq!(updated.email, "tina@example.com");
        assert_eq!(updated.role, Role::Teacher);

        let err = svc
            .update_teacher_profile(&updated, TeacherProfileUpdate::default(), false)
            .await
            .unwrap_err();
        assert_eq!(err.message(), REQUIRED);

        let rename = TeacherProfileUpdate {
            username: Some("tom".into()),
            ..Default::default()
        };
        let err = svc.update_teacher_profile(&updated, rename, true).await.unwrap_err();
        assert_eq!(err.message(), PROFILE_USERNAME_TAKEN);
    }

    #[tokio::test]
    async fn blank_student_password_keeps_hash() {
        let (svc, store, _rx) = service();
        let hash = crate::auth::hash_password("original", 4).unwrap();
        let sam = store
            .insert_user(NewUser::new("sam", "sam@example.com", Role::Student).with_password_hash(hash.clone()))
            .await
            .unwrap();

        let updated = svc
            .update_student_profile(
                &sam,
                StudentProfileUpdate {
                    first_name: Some("Sam".into()),
                    last_name: None,
                    password: Some(String::new()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.first_name, "Sam");
        assert_eq!(updated.password_hash, hash);

        let updated = svc
            .update_student_profile(
                &updated,
                StudentProfileUpdate {
                    password: Some("changed!".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(crate::auth::verify_password("changed!", &updated.password_hash));
    }
}

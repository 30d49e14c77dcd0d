use chrono::Utc;
use uuid::Uuid;

use crate::database::models::{Role, User};

/// Unsaved user with sensible defaults, for tests that only need the value
pub fn user_fixture(username: &str, role: Role) -> User {
    User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        email: format!("{}@example.com", username),
        password_hash: String::new(),
        first_name: String::new(),
        last_name: String::new(),
        role,
        department: None,
        enrollment_year: None,
        batch: None,
        roll_number: None,
        is_active: true,
        is_staff: role == Role::Admin,
        joined_date: Utc::now(),
        last_login: None,
    }
}

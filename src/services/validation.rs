use crate::error::{ApiError, FieldErrors};

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_EMAIL: &str = "Enter a valid email address.";
pub const INVALID_USERNAME: &str =
    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";

pub const USERNAME_MAX: usize = 150;
pub const NAME_MAX: usize = 30;
pub const TITLE_MAX: usize = 200;
pub const EMAIL_MAX: usize = 254;
pub const DEPARTMENT_MAX: usize = 100;
pub const BATCH_MAX: usize = 50;
pub const ROLL_NUMBER_MAX: usize = 50;
pub const DURATION_MAX: usize = 50;
pub const LOCATION_MAX: usize = 100;

/// Collects field errors so a request reports every problem at once
#[derive(Debug, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors.entry(field.to_string()).or_default().push(message.into());
    }

    /// Trimmed value, or an error when absent or blank
    pub fn required(&mut self, field: &str, value: Option<&str>) -> Option<String> {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => Some(v.to_string()),
            _ => {
                self.add(field, REQUIRED);
                None
            }
        }
    }

    pub fn max_len(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.add(field, format!("Ensure this field has no more than {} characters.", max));
        }
    }

    /// Length check for an optional field; absent values pass
    pub fn max_len_opt(&mut self, field: &str, value: Option<&str>, max: usize) {
        if let Some(value) = value {
            self.max_len(field, value.trim(), max);
        }
    }

    pub fn username(&mut self, value: &str) {
        self.max_len("username", value, USERNAME_MAX);
        if !is_valid_username(value) {
            self.add("username", INVALID_USERNAME);
        }
    }

    /// Validates the shape and returns the normalized address
    pub fn email(&mut self, value: &str) -> String {
        self.max_len("email", value.trim(), EMAIL_MAX);
        if !is_valid_email(value) {
            self.add("email", INVALID_EMAIL);
        }
        normalize_email(value)
    }

    /// A single problem becomes the top-level message; several are summarized
    pub fn finish(self) -> Result<(), ApiError> {
        let count: usize = self.errors.values().map(Vec::len).sum();
        match count {
            0 => Ok(()),
            1 => {
                let message = self.errors.values().flatten().next().cloned().unwrap_or_default();
                Err(ApiError::validation_error(message, Some(self.errors)))
            }
            _ => Err(ApiError::validation_error("Invalid input.", Some(self.errors))),
        }
    }
}

/// Lowercases the domain part; the local part is kept as given
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}

pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };
    !local.is_empty()
        && !local.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.split('.').all(|label| !label.is_empty())
}

pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

/// Empty optional text is stored as null
pub fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_domain_is_lowercased() {
        assert_eq!(normalize_email("Amy.Lee@Example.COM"), "Amy.Lee@example.com");
        assert_eq!(normalize_email("  bob@Mail.org "), "bob@mail.org");
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("@b.co"));
        assert!(!is_valid_email("a b@c.co"));
        assert!(!is_valid_email("a@@b.co"));
        assert!(!is_valid_email("a@b..co"));
    }

    #[test]
    fn username_charset() {
        assert!(is_valid_username("amy.lee+1@x_y-z"));
        assert!(!is_valid_username("amy lee"));
        assert!(!is_valid_username("amy/lee"));
    }

    #[test]
    fn single_error_becomes_message() {
        let mut v = Validator::new();
        assert!(v.required("email", Some("   ")).is_none());
        let err = v.finish().unwrap_err();
        assert_eq!(err.message(), REQUIRED);
        assert_eq!(err.to_json()["field_errors"]["email"][0], REQUIRED);
    }

    #[test]
    fn multiple_errors_are_summarized() {
        let mut v = Validator::new();
        v.required("username", None);
        v.max_len("first_name", &"x".repeat(31), NAME_MAX);
        let body = v.finish().unwrap_err().to_json();
        assert_eq!(body["message"], "Invalid input.");
        assert!(body["field_errors"]["first_name"][0]
            .as_str()
            .unwrap()
            .contains("no more than 30"));
    }

    #[test]
    fn optional_lengths_and_long_emails() {
        let mut v = Validator::new();
        v.max_len_opt("batch", None, BATCH_MAX);
        v.max_len_opt("batch", Some(&format!("  {}  ", "b".repeat(BATCH_MAX))), BATCH_MAX);
        assert!(v.finish().is_ok());

        let mut v = Validator::new();
        let long = format!("{}@example.com", "a".repeat(EMAIL_MAX));
        assert_eq!(v.email(&long), long);
        let err = v.finish().unwrap_err();
        assert_eq!(err.message(), "Ensure this field has no more than 254 characters.");
    }
}

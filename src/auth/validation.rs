//! Field validation for auth requests.
//!
//! Every checker reports all failing fields at once through
//! [`ValidationErrors`]; nothing here touches storage.

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

use super::error::ValidationErrors;
use super::messages;
use super::types::{ChangePasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest};

pub const NAME_MAX_LEN: usize = 100;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 50;

/// Normalize an email for lookup/uniqueness checks.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
#[must_use]
pub fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// At least one lowercase, uppercase, digit and symbol.
#[must_use]
pub fn strong_password(password: &str) -> bool {
    password.chars().any(char::is_lowercase)
        && password.chars().any(char::is_uppercase)
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| !c.is_alphanumeric())
}

/// Strict ISO-8601: `YYYY-MM-DD` or a full RFC 3339 timestamp.
#[must_use]
pub fn parse_date_of_birth(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

/// Registration input after every field passed.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub date_of_birth: DateTime<Utc>,
}

fn check_email(errors: &mut ValidationErrors, raw: &str) -> String {
    let email = normalize_email(raw);
    if email.is_empty() {
        errors.push("email", messages::EMAIL_IS_REQUIRED);
    } else if !valid_email(&email) {
        errors.push("email", messages::EMAIL_IS_INVALID);
    }
    email
}

fn check_password(errors: &mut ValidationErrors, field: &str, password: &str) {
    let len = password.chars().count();
    if password.is_empty() {
        errors.push(field, messages::PASSWORD_IS_REQUIRED);
    } else if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        errors.push(field, messages::PASSWORD_LENGTH);
    } else if !strong_password(password) {
        errors.push(field, messages::PASSWORD_MUST_BE_STRONG);
    }
}

fn check_confirm_password(errors: &mut ValidationErrors, password: &str, confirm: &str) {
    if confirm.is_empty() {
        errors.push("confirm_password", messages::CONFIRM_PASSWORD_IS_REQUIRED);
    } else if confirm != password {
        errors.push("confirm_password", messages::CONFIRM_PASSWORD_MUST_MATCH);
    }
}

/// Validate a registration.
///
/// A missing name defaults to the local part of the email.
///
/// # Errors
/// Returns every failing field.
pub fn check_registration(request: &RegisterRequest) -> Result<Registration, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let email = check_email(&mut errors, &request.email);

    let name = match request.name.as_deref().map(str::trim) {
        Some("") => {
            errors.push("name", messages::NAME_IS_REQUIRED);
            String::new()
        }
        Some(name) if name.chars().count() > NAME_MAX_LEN => {
            errors.push("name", messages::NAME_LENGTH);
            String::new()
        }
        Some(name) => name.to_string(),
        None => email.split('@').next().unwrap_or_default().to_string(),
    };

    check_password(&mut errors, "password", &request.password);
    check_confirm_password(&mut errors, &request.password, &request.confirm_password);

    let date_of_birth = parse_date_of_birth(&request.date_of_birth);
    if date_of_birth.is_none() {
        errors.push("date_of_birth", messages::DATE_OF_BIRTH_MUST_BE_ISO8601);
    }

    match date_of_birth {
        Some(date_of_birth) if errors.is_empty() => Ok(Registration {
            name,
            email,
            password: request.password.clone(),
            date_of_birth,
        }),
        _ => Err(errors),
    }
}

/// Validate login input and return the normalized email.
///
/// # Errors
/// Returns every failing field.
pub fn check_login(request: &LoginRequest) -> Result<String, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let email = check_email(&mut errors, &request.email);
    if request.password.is_empty() {
        errors.push("password", messages::PASSWORD_IS_REQUIRED);
    }
    errors.is_empty().then_some(email).ok_or(errors)
}

/// Validate the email submitted to start a password reset.
///
/// # Errors
/// Returns the email failure.
pub fn check_forgot_password_email(raw: &str) -> Result<String, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let email = check_email(&mut errors, raw);
    errors.is_empty().then_some(email).ok_or(errors)
}

/// # Errors
/// Returns every failing field.
pub fn check_reset_password(request: &ResetPasswordRequest) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_password(&mut errors, "password", &request.password);
    check_confirm_password(&mut errors, &request.password, &request.confirm_password);
    errors.is_empty().then_some(()).ok_or(errors)
}

/// Shape checks only; whether `old_password` matches is decided by the service.
///
/// # Errors
/// Returns every failing field.
pub fn check_change_password(request: &ChangePasswordRequest) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if request.old_password.is_empty() {
        errors.push("old_password", messages::OLD_PASSWORD_IS_REQUIRED);
    }
    check_password(&mut errors, "password", &request.password);
    check_confirm_password(&mut errors, &request.password, &request.confirm_password);
    errors.is_empty().then_some(()).ok_or(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn registration() -> RegisterRequest {
        RegisterRequest {
            name: None,
            email: "a@x.com".to_string(),
            password: "Abcdef1!".to_string(),
            confirm_password: "Abcdef1!".to_string(),
            date_of_birth: "1999-01-01".to_string(),
        }
    }

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email("  A@X.Com "), "a@x.com");
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(valid_email("a@x.com"));
        assert!(!valid_email("a@x"));
        assert!(!valid_email("@x.com"));
        assert!(!valid_email("a x@x.com"));
    }

    #[test]
    fn password_strength() {
        assert!(strong_password("Abcdef1!"));
        assert!(!strong_password("abcdef1!"));
        assert!(!strong_password("ABCDEF1!"));
        assert!(!strong_password("Abcdefg!"));
        assert!(!strong_password("Abcdefg1"));
    }

    #[test]
    fn date_of_birth_formats() {
        let date = parse_date_of_birth("1999-01-01");
        assert_eq!(date.map(|d| d.year()), Some(1999));
        assert!(parse_date_of_birth("1999-01-01T10:00:00Z").is_some());
        assert!(parse_date_of_birth("1999-01-01T10:00:00+07:00").is_some());
        assert!(parse_date_of_birth("01/01/1999").is_none());
        assert!(parse_date_of_birth("1999-13-01").is_none());
        assert!(parse_date_of_birth("").is_none());
    }

    #[test]
    fn registration_defaults_name_to_local_part() {
        let checked = check_registration(&registration());
        let Ok(checked) = checked else {
            panic!("registration should pass: {checked:?}");
        };
        assert_eq!(checked.name, "a");
        assert_eq!(checked.email, "a@x.com");
    }

    #[test]
    fn registration_aggregates_every_failure() {
        let request = RegisterRequest {
            name: Some("   ".to_string()),
            email: "nope".to_string(),
            password: "short".to_string(),
            confirm_password: "other".to_string(),
            date_of_birth: "yesterday".to_string(),
        };
        let Err(errors) = check_registration(&request) else {
            panic!("registration should fail");
        };
        assert_eq!(errors.len(), 5);
        assert_eq!(errors.get("email"), Some(messages::EMAIL_IS_INVALID));
        assert_eq!(errors.get("name"), Some(messages::NAME_IS_REQUIRED));
        assert_eq!(errors.get("password"), Some(messages::PASSWORD_LENGTH));
        assert_eq!(
            errors.get("confirm_password"),
            Some(messages::CONFIRM_PASSWORD_MUST_MATCH)
        );
        assert_eq!(
            errors.get("date_of_birth"),
            Some(messages::DATE_OF_BIRTH_MUST_BE_ISO8601)
        );
    }

    #[test]
    fn registration_rejects_long_name() {
        let request = RegisterRequest {
            name: Some("n".repeat(NAME_MAX_LEN + 1)),
            ..registration()
        };
        let Err(errors) = check_registration(&request) else {
            panic!("registration should fail");
        };
        assert_eq!(errors.get("name"), Some(messages::NAME_LENGTH));
    }

    #[test]
    fn login_requires_both_fields() {
        let Err(errors) = check_login(&LoginRequest::default()) else {
            panic!("login should fail");
        };
        assert_eq!(errors.get("email"), Some(messages::EMAIL_IS_REQUIRED));
        assert_eq!(errors.get("password"), Some(messages::PASSWORD_IS_REQUIRED));

        let email = check_login(&LoginRequest {
            email: " A@X.com".to_string(),
            password: "whatever".to_string(),
        });
        assert_eq!(email.ok().as_deref(), Some("a@x.com"));
    }

    #[test]
    fn change_password_requires_old_password() {
        let request = ChangePasswordRequest {
            old_password: String::new(),
            password: "Abcdef1!".to_string(),
            confirm_password: "Abcdef1!".to_string(),
        };
        let Err(errors) = check_change_password(&request) else {
            panic!("change password should fail");
        };
        assert_eq!(
            errors.get("old_password"),
            Some(messages::OLD_PASSWORD_IS_REQUIRED)
        );
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn reset_password_checks_confirmation() {
        let request = ResetPasswordRequest {
            forgot_password_token: "t".to_string(),
            password: "Abcdef1!".to_string(),
            confirm_password: String::new(),
        };
        let Err(errors) = check_reset_password(&request) else {
            panic!("reset should fail");
        };
        assert_eq!(
            errors.get("confirm_password"),
            Some(messages::CONFIRM_PASSWORD_IS_REQUIRED)
        );
    }
}

use garde::Validate;
use serde::Deserialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::models::user::Role;
use crate::validation::form::not_blank;

/// The registration form as submitted by the browser.
#[derive(Default, Deserialize, Validate, Zeroize, ZeroizeOnDrop)]
pub struct RegistrationForm {
    #[serde(default)]
    #[garde(length(chars, min = 1, max = 64), custom(validate_username))]
    pub username: String,
    #[serde(default)]
    #[garde(length(chars, min = 1, max = 128), custom(not_blank))]
    pub password: String,
    #[serde(default)]
    #[garde(matches(password))]
    pub confirm_password: String,
    #[serde(default)]
    #[garde(custom(validate_role))]
    pub role: String,
    #[serde(default)]
    #[garde(skip)]
    pub csrf_token: String,
}

impl RegistrationForm {
    /// The role selected in the form. Only call after validation.
    pub fn role(&self) -> Role {
        self.role.parse().unwrap_or(Role::Student)
    }
}

/// The login form as submitted by the browser.
#[derive(Default, Deserialize, Validate, Zeroize, ZeroizeOnDrop)]
pub struct LoginForm {
    #[serde(default)]
    #[garde(length(chars, min = 1, max = 64), custom(not_blank))]
    pub username: String,
    #[serde(default)]
    #[garde(length(chars, min = 1, max = 128))]
    pub password: String,
    #[serde(default)]
    #[garde(skip)]
    pub csrf_token: String,
}

/// Validates a username.
///
/// Usernames double as the file stem of a student's QR code image, so only
/// letters, numbers, underscores, and hyphens are accepted.
pub fn validate_username(username: &str, _ctx: &()) -> garde::Result {
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(garde::Error::new(
            "Username can only contain letters, numbers, underscores, and hyphens",
        ));
    }

    Ok(())
}

fn validate_role(role: &str, _ctx: &()) -> garde::Result {
    role.parse::<Role>()
        .map(|_| ())
        .map_err(|_| garde::Error::new("Role must be student or teacher"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::form::validated;
    use crate::error::AppError;

    fn registration(username: &str, password: &str, confirm: &str, role: &str) -> RegistrationForm {
        RegistrationForm {
            username: username.to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
            role: role.to_string(),
            csrf_token: String::new(),
        }
    }

    fn field_errors(form: RegistrationForm) -> crate::validation::form::FieldErrors {
        match validated(form) {
            Err(AppError::Validation(errors)) => errors,
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("form unexpectedly validated"),
        }
    }

    #[test]
    fn test_valid_registration_passes() {
        let form = validated(registration("alice", "pw", "pw", "student")).unwrap();
        assert_eq!(form.role(), Role::Student);

        let form = validated(registration("bob_1", "secret", "secret", "teacher")).unwrap();
        assert_eq!(form.role(), Role::Teacher);
    }

    #[test]
    fn test_password_confirmation_must_match() {
        let errors = field_errors(registration("alice", "pw", "other", "student"));
        assert!(errors.has("confirm_password"));
        assert!(!errors.has("username"));
    }

    #[test]
    fn test_empty_fields_are_all_reported() {
        let errors = field_errors(registration("", "", "", "admin"));
        assert!(errors.has("username"));
        assert!(errors.has("password"));
        assert!(errors.has("role"));
    }

    #[test]
    fn test_username_rejects_path_characters() {
        let errors = field_errors(registration("../etc", "pw", "pw", "student"));
        assert!(errors.has("username"));
        assert_eq!(
            errors.for_field("username").next(),
            Some("Username can only contain letters, numbers, underscores, and hyphens")
        );
    }

    #[test]
    fn test_missing_fields_deserialize_as_empty() {
        let form: LoginForm = sonic_rs::from_str(r#"{"username":"alice"}"#).unwrap();
        assert_eq!(form.username, "alice");
        assert!(form.password.is_empty());
        assert!(form.csrf_token.is_empty());

        let form: RegistrationForm = sonic_rs::from_str(r#"{"role":"teacher"}"#).unwrap();
        assert_eq!(form.role(), Role::Teacher);
        assert!(form.username.is_empty());
    }

    #[test]
    fn test_login_requires_both_fields() {
        let form = LoginForm {
            username: "  ".to_string(),
            password: String::new(),
            csrf_token: String::new(),
        };
        match validated(form) {
            Err(AppError::Validation(errors)) => {
                assert!(errors.has("username"));
                assert!(errors.has("password"));
            }
            _ => panic!("blank login should not validate"),
        }
    }
}

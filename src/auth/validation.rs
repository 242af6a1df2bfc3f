//! Input validation for the login and registration forms.

use crate::auth::models::{LoginRequest, RegisterRequest};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 50;
pub const PASSWORD_MIN: usize = 8;

const PASSWORD_SPECIALS: &str = "!@#$%^&*(),.?\":{}|<>";

lazy_static! {
    static ref USERNAME_RE: Regex = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$").unwrap();
}

/// Field name -> messages, serialized as the `details` of a 400 response
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

pub fn validate_login(req: &LoginRequest) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();
    check_username_length(&req.username, &mut errors);
    check_password_length(&req.password, &mut errors);
    errors.into_result()
}

pub fn validate_register(req: &RegisterRequest) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();

    check_username_length(&req.username, &mut errors);
    if !req.username.is_empty() && !USERNAME_RE.is_match(&req.username) {
        errors.add(
            "username",
            "Username can only contain letters, numbers, underscores, and hyphens",
        );
    }

    if !EMAIL_RE.is_match(&req.email) {
        errors.add("email", "Invalid email address");
    }

    check_password_length(&req.password, &mut errors);
    if !is_complex_password(&req.password) {
        errors.add(
            "password",
            "Password must contain at least one uppercase letter, one lowercase letter, one number, and one special character",
        );
    }

    if req.password != req.confirm_password {
        errors.add("confirmPassword", "Passwords do not match");
    }

    errors.into_result()
}

fn check_username_length(username: &str, errors: &mut FieldErrors) {
    let len = username.chars().count();
    if len < USERNAME_MIN {
        errors.add(
            "username",
            format!("Username must be at least {} characters", USERNAME_MIN),
        );
    } else if len > USERNAME_MAX {
        errors.add(
            "username",
            format!("Username must be at most {} characters", USERNAME_MAX),
        );
    }
}

fn check_password_length(password: &str, errors: &mut FieldErrors) {
    if password.chars().count() < PASSWORD_MIN {
        errors.add(
            "password",
            format!("Password must be at least {} characters", PASSWORD_MIN),
        );
    }
}

fn is_complex_password(password: &str) -> bool {
    password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SPECIALS.contains(c))
}

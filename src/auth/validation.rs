use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationErrors;

pub const MIN_PASSWORD_LEN: usize = 6;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn check_email(errors: &mut ValidationErrors, email: &str) {
    if email.is_empty() {
        errors.push("email", "Email is required");
    } else if !is_valid_email(email) {
        errors.push("email", "Please provide a valid email");
    }
}

pub fn check_new_password(errors: &mut ValidationErrors, password: &str) {
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        );
    }
}

/// Expects `username` trimmed and `email` normalized.
pub fn check_signup(username: &str, email: &str, password: &str) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    if username.is_empty() {
        errors.push("username", "Username is required");
    }
    check_email(&mut errors, email);
    check_new_password(&mut errors, password);
    errors
}

pub fn check_login(login: &str, password: &str) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    if login.is_empty() {
        errors.push("login", "Username or email is required");
    }
    if password.is_empty() {
        errors.push("password", "Password is required");
    }
    errors
}

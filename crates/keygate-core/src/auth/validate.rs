//! Client-side input validation.
//!
//! Mirrors the provider's user pool policy so obviously-bad input is
//! rejected before any network call. Each check returns every problem found,
//! not just the first.

use std::sync::LazyLock;

use regex::Regex;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex is valid")
});

static CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{6}$").expect("code regex is valid"));

const SPECIAL_CHARS: &str = "@$!%*?&#";

fn check_email(email: &str, problems: &mut Vec<String>) {
    if email.trim().is_empty() {
        problems.push("email is required".to_string());
    } else if !EMAIL_RE.is_match(email.trim()) {
        problems.push("email is not a valid address".to_string());
    }
}

/// Validates login input: an email address and a password of 8 to 64
/// characters.
pub fn validate_login(email: &str, password: &str) -> Result<(), Vec<String>> {
    let mut problems = Vec::new();
    check_email(email, &mut problems);

    if password.is_empty() {
        problems.push("password is required".to_string());
    } else if password.len() < 8 || password.len() > 64 {
        problems.push("password must be 8 to 64 characters".to_string());
    }

    if problems.is_empty() { Ok(()) } else { Err(problems) }
}

/// Validates signup input: a display name, an email address, and the full
/// password policy (at least 8 characters with a lowercase letter, an
/// uppercase letter, a digit, and a special character).
pub fn validate_signup(email: &str, name: &str, password: &str) -> Result<(), Vec<String>> {
    let mut problems = Vec::new();
    check_email(email, &mut problems);

    if name.trim().is_empty() {
        problems.push("name is required".to_string());
    }

    if password.len() < 8 {
        problems.push("password must be at least 8 characters".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        problems.push("password must contain a lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        problems.push("password must contain an uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        problems.push("password must contain a digit".to_string());
    }
    if !password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
        problems.push(format!(
            "password must contain a special character ({SPECIAL_CHARS})"
        ));
    }

    if problems.is_empty() { Ok(()) } else { Err(problems) }
}

/// Validates a verification code: exactly six digits.
pub fn validate_confirmation_code(code: &str) -> Result<(), Vec<String>> {
    if CODE_RE.is_match(code) {
        Ok(())
    } else {
        Err(vec!["verification code must be exactly 6 digits".to_string()])
    }
}

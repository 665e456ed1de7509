//! Input rules for account operations.
//!
//! Every check fails with [`Error::Validation`] carrying a message meant for
//! the end user.

use crate::prelude::*;

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 30;
pub const PASSWORD_MIN: usize = 8;
pub const EMAIL_MAX: usize = 255;
pub const DISPLAY_NAME_MAX: usize = 100;
pub const BIO_MAX: usize = 500;

fn invalid(message: impl Into<String>) -> Error {
    Error::Validation(message.into())
}

/// 3 to 30 characters, letters, digits and underscores only.
pub fn validate_username(username: &str) -> Result<()> {
    let length = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&length) {
        return Err(invalid(format!(
            "Username must be between {USERNAME_MIN} and {USERNAME_MAX} characters"
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(invalid(
            "Username can only contain letters, numbers and underscores",
        ));
    }
    Ok(())
}

/// Normalizes an email address for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// A single `@` with a non-empty local part and a dotted domain.
pub fn validate_email(email: &str) -> Result<()> {
    let message = "Please provide a valid email address";
    if email.len() > EMAIL_MAX || email.chars().any(char::is_whitespace) {
        return Err(invalid(message));
    }

    let (local, domain) = email.split_once('@').ok_or_else(|| invalid(message))?;
    let domain_ok = !domain.contains('@')
        && domain
            .split('.')
            .all(|label| !label.is_empty() && !label.starts_with('-') && !label.ends_with('-'))
        && domain.contains('.');
    if local.is_empty() || !domain_ok {
        return Err(invalid(message));
    }
    Ok(())
}

/// At least 8 characters with an uppercase letter, a lowercase letter and a digit.
pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < PASSWORD_MIN {
        return Err(invalid(format!(
            "Password must be at least {PASSWORD_MIN} characters long"
        )));
    }
    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_upper && has_lower && has_digit) {
        return Err(invalid(
            "Password must contain at least one uppercase letter, one lowercase letter and one number",
        ));
    }
    Ok(())
}

pub fn validate_confirmation(password: &str, confirmation: &str) -> Result<()> {
    if password != confirmation {
        return Err(invalid("Passwords do not match"));
    }
    Ok(())
}

/// Optional free-text field bounded to `max` characters.
pub fn validate_length(field: &str, value: Option<&str>, max: usize) -> Result<()> {
    match value {
        Some(value) if value.chars().count() > max => Err(invalid(format!(
            "{field} cannot exceed {max} characters"
        ))),
        _ => Ok(()),
    }
}

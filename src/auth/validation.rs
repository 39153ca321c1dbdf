//! Input validation for emails and document names.

use thiserror::Error;

use crate::DocpoolError;

/// Maximum email length.
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum document name length (in characters).
pub const MAX_DOCUMENT_NAME_LENGTH: usize = 255;

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Email is empty.
    #[error("email cannot be empty")]
    EmailEmpty,

    /// Email is too long.
    #[error("email must be at most {MAX_EMAIL_LENGTH} characters")]
    EmailTooLong,

    /// Email format is invalid.
    #[error("invalid email format")]
    EmailInvalidFormat,

    /// Document name is empty.
    #[error("document name cannot be empty")]
    NameEmpty,

    /// Document name is too long.
    #[error("document name must be at most {MAX_DOCUMENT_NAME_LENGTH} characters")]
    NameTooLong,

    /// Document name contains control characters or path separators.
    #[error("document name contains invalid characters")]
    NameInvalidChars,
}

impl From<ValidationError> for DocpoolError {
    fn from(e: ValidationError) -> Self {
        DocpoolError::Validation(e.to_string())
    }
}

/// Normalize an email for storage and comparison: trimmed, ASCII-lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Validate an email address.
///
/// Only a structural check: one `@`, non-empty local part, dotted domain,
/// no whitespace.
///
/// # Examples
///
/// ```
/// use docpool::auth::validation::validate_email;
///
/// assert!(validate_email("user@example.com").is_ok());
/// assert!(validate_email("user@localhost").is_err());
/// ```
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::EmailEmpty);
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::EmailTooLong);
    }

    let (local, domain) = email
        .split_once('@')
        .ok_or(ValidationError::EmailInvalidFormat)?;

    if local.is_empty() || domain.contains('@') {
        return Err(ValidationError::EmailInvalidFormat);
    }

    if !domain.contains('.') || domain.split('.').any(|p| p.is_empty()) {
        return Err(ValidationError::EmailInvalidFormat);
    }

    if email.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ValidationError::EmailInvalidFormat);
    }

    Ok(())
}

/// Validate a document display name.
pub fn validate_document_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::NameEmpty);
    }

    if name.chars().count() > MAX_DOCUMENT_NAME_LENGTH {
        return Err(ValidationError::NameTooLong);
    }

    if name.chars().any(|c| c.is_control() || c == '/' || c == '\\') {
        return Err(ValidationError::NameInvalidChars);
    }

    Ok(())
}

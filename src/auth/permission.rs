//! Permission checks for docpool.
//!
//! A document is readable by its owner and by every email in its share set;
//! only the owner may delete it or change the share set. Managing the storage
//! account pool requires the admin role.

use thiserror::Error;

use super::validation::normalize_email;
use crate::db::{Role, User};
use crate::document::Document;
use crate::DocpoolError;

/// Permission-related errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PermissionError {
    /// No authenticated user.
    #[error("authentication required")]
    NotAuthenticated,

    /// User is not an administrator.
    #[error("administrator role required")]
    AdminRequired,

    /// User does not own the document.
    #[error("only the owner of document {0} can do this")]
    NotOwner(i64),

    /// Document is neither owned by nor shared with the user.
    #[error("document {0} is not shared with you")]
    NotVisible(i64),
}

impl From<PermissionError> for DocpoolError {
    fn from(e: PermissionError) -> Self {
        DocpoolError::PermissionDenied(e.to_string())
    }
}

/// Require an authenticated administrator.
///
/// # Examples
///
/// ```
/// use docpool::auth::permission::{require_admin, PermissionError};
///
/// assert_eq!(require_admin(None), Err(PermissionError::NotAuthenticated));
/// ```
pub fn require_admin(user: Option<&User>) -> Result<(), PermissionError> {
    let user = user.ok_or(PermissionError::NotAuthenticated)?;
    if user.role != Role::Admin {
        return Err(PermissionError::AdminRequired);
    }
    Ok(())
}

/// Whether the user owns the document.
pub fn is_owner(document: &Document, user: &User) -> bool {
    document.owner_id == user.id
}

/// Whether the user may read the document.
pub fn can_read(document: &Document, user: &User) -> bool {
    if is_owner(document, user) {
        return true;
    }
    let email = normalize_email(&user.email);
    document.shared_with.iter().any(|e| *e == email)
}

/// Require ownership of the document.
pub fn require_owner(document: &Document, user: &User) -> Result<(), PermissionError> {
    if is_owner(document, user) {
        Ok(())
    } else {
        Err(PermissionError::NotOwner(document.id))
    }
}

/// Require read access to the document.
pub fn require_read(document: &Document, user: &User) -> Result<(), PermissionError> {
    if can_read(document, user) {
        Ok(())
    } else {
        Err(PermissionError::NotVisible(document.id))
    }
}

//! Authentication and authorization for docpool.
//!
//! Tokens are issued by an external identity provider; this module only
//! resolves principals into users, derives roles, and checks permissions.

pub mod identity;
pub mod permission;
pub mod validation;

pub use identity::{classify, AdminPolicy, IdentityResolver, Principal};
pub use permission::{can_read, is_owner, require_admin, require_owner, require_read, PermissionError};
pub use validation::{normalize_email, validate_document_name, validate_email, ValidationError};

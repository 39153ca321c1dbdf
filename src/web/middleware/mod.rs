//! Middleware for Web API.

pub mod auth;
pub mod cors;

pub use auth::{jwt_auth, AdminUser, AuthUser, CurrentUser, JwtClaims, JwtState};
pub use cors::create_cors_layer;

//! HTTP surface for docpool.
//!
//! A JSON REST API over the document store, sharing engine, and account
//! pool. Callers authenticate with identity-provider JWTs.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::{create_health_router, create_router};
pub use server::{build_app_state, start_revalidation_task, WebServer};

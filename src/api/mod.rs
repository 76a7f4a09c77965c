//! API module
//!
//! HTTP surface: route definitions and the operator-context middleware.

pub mod middleware;
pub mod routes;

pub use routes::create_router;

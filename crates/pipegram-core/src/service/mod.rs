pub mod auth;

#[cfg(feature = "http-api")]
pub mod http;

#[cfg(feature = "http-api")]
pub mod openapi;

#[cfg(feature = "http-api")]
pub use http::{create_router, serve, AppState};

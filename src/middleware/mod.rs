//! Middleware del sistema
//!
//! Autenticación por API key y CORS.

pub mod auth;
pub mod cors;

pub use auth::{require_api_key, require_api_key_for_reports, API_KEY_HEADER};
pub use cors::cors_layer;

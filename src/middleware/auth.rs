//! Middleware de autenticación por API key
//!
//! Sync callers present the shared key in the `x-api-key` header. The check
//! runs before the body is read, so a rejected request never reaches the
//! store. With no key configured every protected request is refused.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::{state::AppState, utils::errors::AppError};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Compare without short-circuiting on the first differing byte
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Verify the presented key against the configured one
pub fn check_api_key(expected: Option<&str>, headers: &HeaderMap) -> Result<(), AppError> {
    let expected = expected.ok_or_else(|| AppError::Unauthorized("API key is not configured on the server".to_string()))?;

    let presented = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing x-api-key header".to_string()))?;

    if !constant_time_eq(presented.as_bytes(), expected.as_bytes()) {
        return Err(AppError::Unauthorized("Invalid API key".to_string()));
    }

    Ok(())
}

/// Middleware para rutas de sincronización
pub async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, AppError> {
    check_api_key(state.config.api_key.as_deref(), request.headers())?;
    Ok(next.run(request).await)
}

/// Middleware para rutas de reportes; solo exige la key si así se configura
pub async fn require_api_key_for_reports(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if state.config.reports_require_api_key {
        check_api_key(state.config.api_key.as_deref(), request.headers())?;
    } else {
        debug!("Report access without API key: {}", request.uri().path());
    }
    Ok(next.run(request).await)
}

//! Authentication middleware for protected endpoints.
//!
//! Extracts and validates the bearer token from the Authorization header,
//! then injects the caller's [`Identity`] into request extensions.
//!
//! # Extracting the caller
//!
//! ```rust,no_run
//! use axum::extract::Extension;
//! use roach_race::Identity;
//!
//! async fn protected_handler(Extension(caller): Extension<Identity>) -> String {
//!     format!("Authenticated as {}", caller)
//! }
//! # let _ = protected_handler;
//! ```

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use super::{AppState, errors::ApiError};
use crate::logging;

/// Authentication middleware that validates JWT tokens and injects the
/// caller identity.
///
/// - **Success**: Token valid → Injects `Identity` into request extensions → Calls next handler
/// - **Missing header / invalid format**: Returns `401 Unauthorized`
/// - **Invalid/expired token**: Returns `401 Unauthorized`
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // Extract token from Authorization header
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthenticated("Missing bearer token".to_string()))?;

    match state.tokens.verify(token) {
        Ok(claims) => {
            request.extensions_mut().insert(claims.identity());
            Ok(next.run(request).await)
        }
        Err(e) => {
            logging::log_security_event("invalid_token", None, &e.to_string());
            Err(ApiError::Unauthenticated("Invalid or expired token".to_string()))
        }
    }
}

//! Bearer-token gate for the mutating store endpoints

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use tracing::{info, warn};

use crate::app::AppState;

/// Authentication error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Authorization header is missing")]
    MissingHeader,

    #[error("Authorization header value is invalid")]
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::MissingHeader => StatusCode::UNAUTHORIZED,
            AuthError::InvalidToken => StatusCode::FORBIDDEN,
        };

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, Json(body)).into_response()
    }
}

/// Check a bearer credential against the configured secret.
///
/// The whole header value is compared to `"Bearer " + secret`.
pub fn check_bearer(header: Option<&str>, secret: &str) -> Result<(), AuthError> {
    let value = header.ok_or(AuthError::MissingHeader)?;

    if value != format!("Bearer {}", secret) {
        return Err(AuthError::InvalidToken);
    }

    Ok(())
}

/// Middleware gating the mutating store routes.
///
/// Only the protected sub-router carries this layer; reads never pass
/// through here.
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let path = request.uri().path().to_owned();
    let method = request.method().clone();

    info!("auth check: path={}, method={}", path, method);

    let header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    if let Err(err) = check_bearer(header, &state.config.api_token) {
        warn!("auth rejected: path={}, method={}: {}", path, method, err);
        return Err(err);
    }

    info!("auth passed: path={}, method={}", path, method);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_header_is_unauthenticated() {
        assert!(matches!(
            check_bearer(None, "secret"),
            Err(AuthError::MissingHeader)
        ));
    }

    #[test]
    fn wrong_token_is_forbidden() {
        assert!(matches!(
            check_bearer(Some("Bearer nope"), "secret"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn scheme_is_case_sensitive() {
        assert!(matches!(
            check_bearer(Some("bearer secret"), "secret"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn bare_token_without_scheme_is_rejected() {
        assert!(matches!(
            check_bearer(Some("secret"), "secret"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn exact_bearer_value_passes() {
        assert!(check_bearer(Some("Bearer secret"), "secret").is_ok());
    }
}

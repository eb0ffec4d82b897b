//! Host-side guard for the `/admin` route group. Provider traffic never
//! passes through here; it is admitted by the security gate instead.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use constant_time_eq::constant_time_eq;
use serde_json::json;
use tracing::warn;

use crate::AppState;

const ROUTE_GROUP: &str = "admin";
const CHALLENGE: &str = r#"Bearer realm="postrelease-admin""#;

/// Why an admin request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingCredentials,
    /// An `Authorization` header with a scheme other than `Bearer`.
    UnsupportedScheme,
    WrongKey,
}

impl Rejection {
    fn reason(self) -> &'static str {
        match self {
            Rejection::MissingCredentials => "missing credentials",
            Rejection::UnsupportedScheme => "only the Bearer scheme is accepted",
            Rejection::WrongKey => "api key does not match",
        }
    }
}

/// Check `Authorization: Bearer <key>` against `expected`. The scheme name is
/// matched case-insensitively, the key in constant time.
pub fn check_bearer(headers: &HeaderMap, expected: &str) -> Result<(), Rejection> {
    let raw = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(Rejection::MissingCredentials)?;

    let (scheme, token) = raw.split_once(' ').unwrap_or((raw, ""));
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(Rejection::UnsupportedScheme);
    }
    if constant_time_eq(token.trim().as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        Err(Rejection::WrongKey)
    }
}

/// With no PRX_API_KEY configured every request passes through.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = &state.api_key else {
        return next.run(request).await;
    };

    match check_bearer(request.headers(), expected) {
        Ok(()) => next.run(request).await,
        Err(rejection) => {
            warn!(
                group = ROUTE_GROUP,
                method = %request.method(),
                path = %request.uri().path(),
                reason = rejection.reason(),
                "audit: admin.unauthorized"
            );
            (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, CHALLENGE)],
                Json(json!({"error": rejection.reason()})),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn with_auth(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn matching_bearer_key_passes() {
        assert_eq!(check_bearer(&with_auth("Bearer host-token"), "host-token"), Ok(()));
        assert_eq!(check_bearer(&with_auth("bearer host-token"), "host-token"), Ok(()));
    }

    #[test]
    fn other_schemes_are_rejected_even_with_the_right_key() {
        assert_eq!(
            check_bearer(&with_auth("Basic host-token"), "host-token"),
            Err(Rejection::UnsupportedScheme)
        );
        assert_eq!(
            check_bearer(&with_auth("host-token"), "host-token"),
            Err(Rejection::UnsupportedScheme)
        );
    }

    #[test]
    fn missing_or_wrong_key_is_rejected() {
        assert_eq!(
            check_bearer(&HeaderMap::new(), "host-token"),
            Err(Rejection::MissingCredentials)
        );
        assert_eq!(
            check_bearer(&with_auth("Bearer nope"), "host-token"),
            Err(Rejection::WrongKey)
        );
        assert_eq!(
            check_bearer(&with_auth("Bearer"), "host-token"),
            Err(Rejection::WrongKey)
        );
    }
}

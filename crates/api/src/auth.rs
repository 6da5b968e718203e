//! Dashboard token checks shared by the REST routes and the event socket.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{routes::error_response, AppState};

type HmacSha256 = Hmac<Sha256>;

/// Compare a presented token against the configured one without leaking
/// the position of the first mismatch through timing.
///
/// Both sides are reduced to an HMAC tag keyed by the expected token and
/// the tags are compared with `verify_slice`, which runs in constant time.
pub(crate) fn token_matches(expected: &str, presented: &str) -> bool {
    let tag = |token: &str| {
        HmacSha256::new_from_slice(expected.as_bytes()).map(|mut mac| {
            mac.update(token.as_bytes());
            mac
        })
    };
    match (tag(expected), tag(presented)) {
        (Ok(reference), Ok(candidate)) => candidate
            .verify_slice(&reference.finalize().into_bytes())
            .is_ok(),
        _ => false,
    }
}

/// Bearer-token gate on every `/api/*` route.
pub async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let bearer = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match bearer {
        Some(token) if token_matches(&state.dashboard_token, token) => next.run(request).await,
        Some(_) => unauthorized("dashboard token does not match"),
        None => unauthorized("missing 'Authorization: Bearer <token>' header"),
    }
}

pub(crate) fn unauthorized(detail: &str) -> Response {
    error_response(StatusCode::UNAUTHORIZED, "unauthorized", detail).into_response()
}

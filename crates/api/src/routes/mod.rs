mod api;
mod health;
mod ws;

use axum::{http::StatusCode, Json};
use serde_json::{json, Value};

pub use api::api_router;
pub use health::health_router;
pub use ws::ws_router;

pub(crate) type ApiResponse = (StatusCode, Json<Value>);

/// Error body shared by every route: a short message plus the detail.
pub(crate) fn error_response(
    status: StatusCode,
    message: &str,
    detail: impl ToString,
) -> ApiResponse {
    (
        status,
        Json(json!({ "error": message, "detail": detail.to_string() })),
    )
}

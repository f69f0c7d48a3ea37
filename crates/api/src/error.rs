//! API error responses
//!
//! Maps domain errors to HTTP status codes with a structured JSON body, so
//! handlers can use `?` and the client always receives `{ "error": ... }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use meetsync_domain::MeetSyncError;
use serde_json::json;
use tracing::warn;

/// Wrapper that turns a `MeetSyncError` into an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub MeetSyncError);

impl From<MeetSyncError> for ApiError {
    fn from(err: MeetSyncError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            MeetSyncError::NotFound(_) => StatusCode::NOT_FOUND,
            MeetSyncError::InvalidInput(_) | MeetSyncError::InvalidState(_) => {
                StatusCode::BAD_REQUEST
            }
            MeetSyncError::Auth(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            warn!(error = %self.0, "request failed");
        }

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

use axum::{
    Json, http,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tile_engine::ErrorKind;

use crate::Error;

/// Our app's top level error type: maps the engine's abstract `ErrorKind`
/// taxonomy onto HTTP status codes.
#[derive(Debug)]
pub struct AppError(pub Error);

impl From<Error> for AppError {
    fn from(inner: Error) -> Self {
        AppError(inner)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = match err.kind() {
            ErrorKind::InvalidRequest => http::StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => http::StatusCode::NOT_FOUND,
            ErrorKind::StoreUnavailable => http::StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Overloaded => http::StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Timeout => http::StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Internal => http::StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": err.to_string(),
        }));

        if matches!(err.kind(), ErrorKind::Overloaded) {
            return (status, [(http::header::RETRY_AFTER, "1")], body).into_response();
        }

        (status, body).into_response()
    }
}

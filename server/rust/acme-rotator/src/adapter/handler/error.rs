use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::ErrorResponse;
use crate::domain::error::RotationError;

/// status_for はローテーションエラーを HTTP ステータスに対応付ける。
pub fn status_for(err: &RotationError) -> StatusCode {
    match err {
        RotationError::UnknownStep(_) => StatusCode::BAD_REQUEST,
        RotationError::PropagationTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        e if e.is_upstream() => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for RotationError {
    fn into_response(self) -> Response {
        let body = ErrorResponse::new(self.code(), &self.to_string());
        (status_for(&self), Json(body)).into_response()
    }
}

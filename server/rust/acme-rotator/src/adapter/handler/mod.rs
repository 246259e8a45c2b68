pub mod error;
pub mod rotation_handler;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::usecase::RotateSecretUseCase;

/// AppState はアプリケーション全体の共有状態を表す。
#[derive(Clone)]
pub struct AppState {
    pub account_rotation: Arc<RotateSecretUseCase>,
    pub certificate_rotation: Arc<RotateSecretUseCase>,
}

/// REST API ルーターを構築する。
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(rotation_handler::healthz))
        // ローテーションコールバック
        .route(
            "/api/v1/rotations/account",
            post(rotation_handler::rotate_account),
        )
        .route(
            "/api/v1/rotations/certificate",
            post(rotation_handler::rotate_certificate),
        )
        .with_state(state)
}

/// ErrorResponse は統一エラーレスポンス。
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, serde::Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub request_id: String,
    pub details: Vec<String>,
}

impl ErrorResponse {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            error: ErrorBody {
                code: code.to_string(),
                message: message.to_string(),
                request_id: uuid::Uuid::new_v4().to_string(),
                details: vec![],
            },
        }
    }
}

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::AppState;
use crate::domain::entity::RotationEvent;
use crate::domain::error::RotationError;
use crate::usecase::RotateSecretUseCase;

// --- Request DTOs ---

/// RotationRequest はシークレットローテーション基盤から届くイベント。
#[derive(Debug, Deserialize)]
pub struct RotationRequest {
    #[serde(rename = "SecretId", alias = "secretId")]
    pub secret_id: String,
    #[serde(rename = "ClientRequestToken", alias = "clientRequestToken")]
    pub client_request_token: String,
    #[serde(rename = "Step", alias = "step")]
    pub step: String,
}

impl From<RotationRequest> for RotationEvent {
    fn from(req: RotationRequest) -> Self {
        RotationEvent::new(req.secret_id, req.client_request_token, req.step)
    }
}

async fn rotate(
    usecase: &RotateSecretUseCase,
    req: RotationRequest,
) -> Result<StatusCode, RotationError> {
    usecase.execute(&req.into()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn rotate_account(
    State(state): State<AppState>,
    Json(req): Json<RotationRequest>,
) -> Result<StatusCode, RotationError> {
    rotate(&state.account_rotation, req).await
}

pub async fn rotate_certificate(
    State(state): State<AppState>,
    Json(req): Json<RotationRequest>,
) -> Result<StatusCode, RotationError> {
    rotate(&state.certificate_rotation, req).await
}

pub async fn healthz() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

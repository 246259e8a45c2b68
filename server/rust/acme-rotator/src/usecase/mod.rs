pub mod account_rotation;
pub mod certificate_rotation;
pub mod rotate_secret;

use async_trait::async_trait;

use crate::domain::entity::{RotationEvent, VersionStage};
use crate::domain::error::RotationError;
use crate::domain::repository::{SecretStore, SecretStoreError};

pub use account_rotation::{AccountRotationWorkflow, AccountSettings};
pub use certificate_rotation::CertificateRotationWorkflow;
pub use rotate_secret::RotateSecretUseCase;

/// RotationWorkflow はシークレット種別ごとの createSecret / setSecret / testSecret を実装する。
/// finishSecret とロールバックは RotateSecretUseCase が共通で処理する。
#[async_trait]
pub trait RotationWorkflow: Send + Sync {
    fn name(&self) -> &'static str;

    async fn create_secret(&self, event: &RotationEvent) -> Result<(), RotationError>;

    async fn set_secret(&self, event: &RotationEvent) -> Result<(), RotationError>;

    async fn test_secret(&self, event: &RotationEvent) -> Result<(), RotationError>;
}

/// token のバージョンが既に pending を持っているかを確認する。
pub(crate) async fn pending_version_exists(
    store: &dyn SecretStore,
    event: &RotationEvent,
) -> Result<bool, RotationError> {
    let versions = match store.list_versions(&event.secret_id).await {
        Ok(versions) => versions.unwrap_or_default(),
        Err(SecretStoreError::NotFound(_)) => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    Ok(versions.iter().any(|v| {
        v.version_id == event.client_request_token && v.has_stage(VersionStage::Pending)
    }))
}

/// setSecret の結果を token の pending バージョンへ書き戻す。
/// AlreadyExists は pending の内容が書き込んだ値と一致する場合だけ成功とみなす。
pub(crate) async fn write_back_pending(
    store: &dyn SecretStore,
    event: &RotationEvent,
    secret_string: &str,
) -> Result<(), RotationError> {
    match store
        .put(
            &event.secret_id,
            &event.client_request_token,
            secret_string,
            &[VersionStage::Pending],
        )
        .await
    {
        Ok(()) => Ok(()),
        Err(SecretStoreError::AlreadyExists(target)) => {
            let stored = store.get(&event.secret_id, VersionStage::Pending).await?;
            if stored == secret_string {
                tracing::info!("pending version already holds the written value");
                Ok(())
            } else {
                tracing::warn!(version = %target, "secret store rejected pending write-back");
                Err(SecretStoreError::AlreadyExists(target).into())
            }
        }
        Err(e) => Err(e.into()),
    }
}

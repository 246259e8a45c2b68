use async_trait::async_trait;

use crate::domain::entity::{SecretVersion, StageUpdate, VersionStage};

/// SecretStoreError はシークレットストア操作の失敗。
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SecretStoreError {
    #[error("シークレットが見つかりません: {0}")]
    NotFound(String),
    /// token のバージョンへの書き込みを拒否された（同じ内容の再登録を含む）
    #[error("シークレットバージョンは既に存在します: {0}")]
    AlreadyExists(String),
    #[error("シークレットストアエラー: {0}")]
    Unavailable(String),
}

/// SecretStore はステージラベル付きのバージョン管理を行うシークレットストア。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// stage が付与されたバージョンの値を取得する。
    async fn get(&self, secret_id: &str, stage: VersionStage) -> Result<String, SecretStoreError>;

    /// token をバージョン ID として値を保存し、stages を付与する。
    async fn put(
        &self,
        secret_id: &str,
        token: &str,
        secret_string: &str,
        stages: &[VersionStage],
    ) -> Result<(), SecretStoreError>;

    /// バージョン一覧を取得する。ストアが一覧を返さない場合は None。
    async fn list_versions(
        &self,
        secret_id: &str,
    ) -> Result<Option<Vec<SecretVersion>>, SecretStoreError>;

    /// ステージラベルを付け替える。
    async fn move_stage(
        &self,
        secret_id: &str,
        update: &StageUpdate,
    ) -> Result<(), SecretStoreError>;
}

use async_trait::async_trait;

use crate::domain::entity::KeyConfig;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum KeyGenerationError {
    #[error("未対応の鍵種別です: {0}")]
    Unsupported(String),
    #[error("鍵の生成に失敗しました: {0}")]
    Failed(String),
    #[error("秘密鍵を解析できません: {0}")]
    InvalidKey(String),
}

/// KeyGenerator は KeyConfig に従って PKCS#8 PEM 形式の秘密鍵を生成する。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyGenerator: Send + Sync {
    async fn generate(&self, config: &KeyConfig) -> Result<String, KeyGenerationError>;
}

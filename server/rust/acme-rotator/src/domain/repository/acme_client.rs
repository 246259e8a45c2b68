use std::sync::Arc;

use acme_dns_challenge::{ChallengeError, ChallengeHandler};
use async_trait::async_trait;

/// AcmeError は ACME サーバとのやり取りの失敗。
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AcmeError {
    #[error("ディレクトリを取得できません: {0}")]
    Directory(String),
    #[error("ACME への HTTP リクエストに失敗しました: {0}")]
    Http(String),
    /// ACME サーバが problem document を返した
    #[error("ACME サーバがエラーを返しました ({status}): {problem_type}: {detail}")]
    Problem {
        status: u16,
        problem_type: String,
        detail: String,
    },
    #[error("アカウント鍵が不正です: {0}")]
    InvalidKey(String),
    #[error("CSR の生成に失敗しました: {0}")]
    Csr(String),
    #[error("オーダーが失敗しました: {0}")]
    OrderFailed(String),
    #[error("ステータスの確認がタイムアウトしました: {0}")]
    Timeout(String),
    #[error(transparent)]
    Challenge(#[from] ChallengeError),
}

/// IssueRequest は証明書発行（auto）の入力。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRequest {
    pub domain: String,
    /// DER 形式の CSR
    pub csr: Vec<u8>,
    /// 利用するチャレンジ種別の優先順
    pub challenge_priority: Vec<String>,
}

/// AcmeClient は 1 つのアカウント鍵に紐づいた ACME クライアント。
#[async_trait]
pub trait AcmeClient: Send + Sync {
    /// 規約に同意してアカウントを作成し、サーバが返したアカウントオブジェクトを返す。
    async fn create_account(&self, contact: &[String]) -> Result<serde_json::Value, AcmeError>;

    /// 現在のアカウント鍵で認証し、アカウント鍵を new_key_pem に切り替える。
    async fn update_account_key(&self, new_key_pem: &str)
        -> Result<serde_json::Value, AcmeError>;

    /// common_name を CN / SAN に持つ CSR を key_pem で署名して DER で返す。
    fn create_csr(&self, common_name: &str, key_pem: &str) -> Result<Vec<u8>, AcmeError>;

    /// オーダー作成からチャレンジ、ファイナライズ、証明書取得までを行い PEM チェーンを返す。
    /// チャレンジの作成・削除は handler に委譲する。
    async fn auto(
        &self,
        request: &IssueRequest,
        handler: &dyn ChallengeHandler,
    ) -> Result<String, AcmeError>;
}

/// AcmeClientFactory はディレクトリ URL とアカウント鍵から AcmeClient を作る。
#[async_trait]
pub trait AcmeClientFactory: Send + Sync {
    async fn connect(
        &self,
        directory_url: &str,
        account_key_pem: &str,
    ) -> Result<Arc<dyn AcmeClient>, AcmeError>;
}

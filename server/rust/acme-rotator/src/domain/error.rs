use acme_dns_challenge::ChallengeError;

use crate::domain::repository::{AcmeError, KeyGenerationError, SecretStoreError};

/// RotationError はローテーション 1 回分の失敗。フェーズ内のすべての失敗はこの型で返る。
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RotationError {
    #[error("未知のステップです: {0}")]
    UnknownStep(String),
    #[error("シークレットの形式が不正です: {0}")]
    MalformedSecret(String),
    #[error("必要な項目がありません: {0}")]
    MissingField(String),
    #[error("dns-01 以外のチャレンジには対応していません (request: \"{0}\")")]
    UnsupportedChallengeType(String),
    #[error("TXT レコードの伝播がタイムアウトしました ({timeout_secs}s): {record_name}")]
    PropagationTimeout {
        record_name: String,
        timeout_secs: u64,
    },
    #[error(transparent)]
    SecretStore(#[from] SecretStoreError),
    #[error("ACME エラー: {0}")]
    Acme(String),
    #[error("DNS エラー: {0}")]
    Dns(String),
    #[error(transparent)]
    KeyGeneration(#[from] KeyGenerationError),
}

impl RotationError {
    /// 外部サービス（シークレットストア / ACME / DNS）起因の失敗かどうか。
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            RotationError::SecretStore(_) | RotationError::Acme(_) | RotationError::Dns(_)
        )
    }

    pub fn code(&self) -> &'static str {
        match self {
            RotationError::UnknownStep(_) => "SYS_ROTATION_UNKNOWN_STEP",
            RotationError::MalformedSecret(_) => "SYS_ROTATION_MALFORMED_SECRET",
            RotationError::MissingField(_) => "SYS_ROTATION_MISSING_FIELD",
            RotationError::UnsupportedChallengeType(_) => "SYS_ROTATION_UNSUPPORTED_CHALLENGE",
            RotationError::PropagationTimeout { .. } => "SYS_ROTATION_PROPAGATION_TIMEOUT",
            RotationError::SecretStore(_) => "SYS_ROTATION_SECRET_STORE_ERROR",
            RotationError::Acme(_) => "SYS_ROTATION_ACME_ERROR",
            RotationError::Dns(_) => "SYS_ROTATION_DNS_ERROR",
            RotationError::KeyGeneration(_) => "SYS_ROTATION_KEY_GENERATION_ERROR",
        }
    }
}

impl From<ChallengeError> for RotationError {
    fn from(err: ChallengeError) -> Self {
        match err {
            ChallengeError::UnsupportedChallengeType(t) => {
                RotationError::UnsupportedChallengeType(t)
            }
            ChallengeError::PropagationTimeout {
                record_name,
                timeout,
            } => RotationError::PropagationTimeout {
                record_name,
                timeout_secs: timeout.as_secs(),
            },
            other => RotationError::Dns(other.to_string()),
        }
    }
}

impl From<AcmeError> for RotationError {
    fn from(err: AcmeError) -> Self {
        match err {
            AcmeError::Challenge(challenge) => challenge.into(),
            other => RotationError::Acme(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use acme_dns_challenge::{DnsProviderError, ResolveError};

    use super::*;

    #[test]
    fn test_from_challenge_error() {
        let err: RotationError =
            ChallengeError::UnsupportedChallengeType("http-01".to_string()).into();
        assert_eq!(
            err,
            RotationError::UnsupportedChallengeType("http-01".to_string())
        );

        let err: RotationError = ChallengeError::PropagationTimeout {
            record_name: "_acme-challenge.example.com.".to_string(),
            timeout: Duration::from_secs(600),
        }
        .into();
        assert_eq!(
            err,
            RotationError::PropagationTimeout {
                record_name: "_acme-challenge.example.com.".to_string(),
                timeout_secs: 600,
            }
        );

        let err: RotationError =
            ChallengeError::Resolve(ResolveError::Failed("SERVFAIL".to_string())).into();
        assert!(matches!(err, RotationError::Dns(_)));
        assert!(err.is_upstream());
    }

    #[test]
    fn test_from_acme_error_unwraps_challenge() {
        let err: RotationError = AcmeError::Challenge(ChallengeError::Provider(
            DnsProviderError::PermissionDenied("Z1".to_string()),
        ))
        .into();
        assert!(matches!(err, RotationError::Dns(_)));

        let err: RotationError = AcmeError::Challenge(ChallengeError::UnsupportedChallengeType(
            "tls-alpn-01".to_string(),
        ))
        .into();
        assert_eq!(err.code(), "SYS_ROTATION_UNSUPPORTED_CHALLENGE");

        let err: RotationError = AcmeError::OrderFailed("invalid".to_string()).into();
        assert!(matches!(err, RotationError::Acme(_)));
    }

    #[test]
    fn test_upstream_classification() {
        assert!(RotationError::SecretStore(SecretStoreError::Unavailable("x".into())).is_upstream());
        assert!(!RotationError::UnknownStep("x".into()).is_upstream());
        assert!(!RotationError::MissingField("x".into()).is_upstream());
    }
}

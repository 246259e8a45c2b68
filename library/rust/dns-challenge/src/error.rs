use std::time::Duration;

use thiserror::Error;

/// ResolveError は TXT レコード問い合わせの失敗を表す。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// レコードがまだ公開されていない（NXDOMAIN / NODATA）。ポーリング中は再試行対象。
    #[error("TXT レコードが見つかりません: {0}")]
    NotFound(String),
    #[error("名前解決に失敗しました: {0}")]
    Failed(String),
}

impl ResolveError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// DnsProviderError は DNS プロバイダへのレコード操作の失敗を表す。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DnsProviderError {
    #[error("ホストゾーンが見つかりません: {0}")]
    ZoneNotFound(String),
    #[error("権限が拒否されました: {0}")]
    PermissionDenied(String),
    #[error("DNS プロバイダエラー: {0}")]
    Server(String),
}

/// ChallengeError は DNS-01 チャレンジ処理の失敗を表す。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChallengeError {
    #[error("dns-01 以外のチャレンジには対応していません (request: \"{0}\")")]
    UnsupportedChallengeType(String),
    #[error("TXT レコードの伝播がタイムアウトしました ({}s): {record_name}", .timeout.as_secs())]
    PropagationTimeout {
        record_name: String,
        timeout: Duration,
    },
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Provider(#[from] DnsProviderError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_error_not_found() {
        assert!(ResolveError::NotFound("_acme-challenge.example.com.".into()).is_not_found());
        assert!(!ResolveError::Failed("SERVFAIL".into()).is_not_found());
    }

    #[test]
    fn test_propagation_timeout_message() {
        let err = ChallengeError::PropagationTimeout {
            record_name: "_acme-challenge.example.com.".to_string(),
            timeout: Duration::from_secs(600),
        };
        let msg = err.to_string();
        assert!(msg.contains("600s"));
        assert!(msg.contains("_acme-challenge.example.com."));
    }

    #[test]
    fn test_unsupported_challenge_message() {
        let err = ChallengeError::UnsupportedChallengeType("http-01".to_string());
        assert!(err.to_string().contains("http-01"));
    }
}

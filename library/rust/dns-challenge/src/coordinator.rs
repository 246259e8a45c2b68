use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ChallengeConfig;
use crate::error::ChallengeError;
use crate::propagation::wait_for_propagation;
use crate::provider::{quote_txt_value, DnsProvider};
use crate::resolver::TxtResolver;

pub const DNS01_CHALLENGE: &str = "dns-01";

/// Challenge は ACME クライアントがコールバックに渡すチャレンジ情報。
/// key_authorization は dns-01 の場合 TXT レコードに公開するダイジェスト値である。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub challenge_type: String,
    pub domain: String,
    pub key_authorization: String,
}

impl Challenge {
    pub fn dns01(domain: impl Into<String>, key_authorization: impl Into<String>) -> Self {
        Self {
            challenge_type: DNS01_CHALLENGE.to_string(),
            domain: domain.into(),
            key_authorization: key_authorization.into(),
        }
    }
}

/// ChallengeHandler は ACME クライアントから呼び出されるチャレンジの作成・削除コールバック。
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait ChallengeHandler: Send + Sync {
    async fn create_challenge(&self, challenge: &Challenge) -> Result<(), ChallengeError>;
    async fn remove_challenge(&self, challenge: &Challenge) -> Result<(), ChallengeError>;
}

/// record_name はドメインに対応するチャレンジ用 TXT レコード名（末尾ドット付き）を返す。
pub fn record_name(domain: &str) -> String {
    format!("_acme-challenge.{domain}.")
}

/// Dns01Coordinator は 1 つのホストゾーンに対して DNS-01 チャレンジを処理する。
pub struct Dns01Coordinator {
    provider: Arc<dyn DnsProvider>,
    resolver: Arc<dyn TxtResolver>,
    zone_id: String,
    config: ChallengeConfig,
}

impl Dns01Coordinator {
    pub fn new(
        provider: Arc<dyn DnsProvider>,
        resolver: Arc<dyn TxtResolver>,
        zone_id: impl Into<String>,
        config: ChallengeConfig,
    ) -> Self {
        Self {
            provider,
            resolver,
            zone_id: zone_id.into(),
            config,
        }
    }

    pub fn zone_id(&self) -> &str {
        &self.zone_id
    }

    fn ensure_dns01(challenge: &Challenge) -> Result<(), ChallengeError> {
        if challenge.challenge_type == DNS01_CHALLENGE {
            Ok(())
        } else {
            Err(ChallengeError::UnsupportedChallengeType(
                challenge.challenge_type.clone(),
            ))
        }
    }
}

#[async_trait]
impl ChallengeHandler for Dns01Coordinator {
    async fn create_challenge(&self, challenge: &Challenge) -> Result<(), ChallengeError> {
        Self::ensure_dns01(challenge)?;

        let name = record_name(&challenge.domain);
        tracing::info!(
            record_name = %name,
            zone_id = %self.zone_id,
            "creating dns-01 challenge record"
        );
        self.provider
            .upsert_txt(
                &self.zone_id,
                &name,
                &quote_txt_value(&challenge.key_authorization),
                self.config.record_ttl,
            )
            .await?;

        wait_for_propagation(
            self.resolver.as_ref(),
            &name,
            &challenge.key_authorization,
            &self.config,
        )
        .await
    }

    async fn remove_challenge(&self, challenge: &Challenge) -> Result<(), ChallengeError> {
        Self::ensure_dns01(challenge)?;

        let name = record_name(&challenge.domain);
        tracing::info!(
            record_name = %name,
            zone_id = %self.zone_id,
            "removing dns-01 challenge record"
        );
        self.provider
            .delete_txt(
                &self.zone_id,
                &name,
                &quote_txt_value(&challenge.key_authorization),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::{DnsProviderError, ResolveError};
    use crate::provider::MockDnsProvider;
    use crate::resolver::MockTxtResolver;

    fn fast_config() -> ChallengeConfig {
        ChallengeConfig::default()
            .poll_interval(Duration::from_secs(1))
            .propagation_timeout(Duration::from_secs(3))
    }

    #[test]
    fn test_record_name() {
        assert_eq!(record_name("example.com"), "_acme-challenge.example.com.");
    }

    #[tokio::test]
    async fn test_create_rejects_non_dns01_without_provider_call() {
        let mut provider = MockDnsProvider::new();
        provider.expect_upsert_txt().never();
        let mut resolver = MockTxtResolver::new();
        resolver.expect_resolve_txt().never();

        let coordinator = Dns01Coordinator::new(
            Arc::new(provider),
            Arc::new(resolver),
            "Z123",
            ChallengeConfig::default(),
        );
        let challenge = Challenge {
            challenge_type: "http-01".to_string(),
            domain: "example.com".to_string(),
            key_authorization: "abc".to_string(),
        };

        let err = coordinator.create_challenge(&challenge).await.unwrap_err();
        assert_eq!(
            err,
            ChallengeError::UnsupportedChallengeType("http-01".to_string())
        );
    }

    #[tokio::test]
    async fn test_remove_rejects_non_dns01_without_provider_call() {
        let mut provider = MockDnsProvider::new();
        provider.expect_delete_txt().never();

        let coordinator = Dns01Coordinator::new(
            Arc::new(provider),
            Arc::new(MockTxtResolver::new()),
            "Z123",
            ChallengeConfig::default(),
        );
        let challenge = Challenge {
            challenge_type: "tls-alpn-01".to_string(),
            domain: "example.com".to_string(),
            key_authorization: "abc".to_string(),
        };

        let err = coordinator.remove_challenge(&challenge).await.unwrap_err();
        assert!(matches!(err, ChallengeError::UnsupportedChallengeType(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_upserts_quoted_value_and_waits() {
        let mut provider = MockDnsProvider::new();
        provider
            .expect_upsert_txt()
            .withf(|zone, name, value, ttl| {
                zone == "Z123"
                    && name == "_acme-challenge.example.com."
                    && value == "\"abc\""
                    && *ttl == 60
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        let mut resolver = MockTxtResolver::new();
        resolver
            .expect_resolve_txt()
            .withf(|name| name == "_acme-challenge.example.com.")
            .times(1)
            .returning(|_| Ok(vec![vec!["abc".to_string()]]));

        let coordinator = Dns01Coordinator::new(
            Arc::new(provider),
            Arc::new(resolver),
            "Z123",
            ChallengeConfig::default(),
        );

        let result = coordinator
            .create_challenge(&Challenge::dns01("example.com", "abc"))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_create_propagates_provider_error() {
        let mut provider = MockDnsProvider::new();
        provider
            .expect_upsert_txt()
            .returning(|_, _, _, _| Err(DnsProviderError::PermissionDenied("denied".into())));
        let mut resolver = MockTxtResolver::new();
        resolver.expect_resolve_txt().never();

        let coordinator = Dns01Coordinator::new(
            Arc::new(provider),
            Arc::new(resolver),
            "Z123",
            ChallengeConfig::default(),
        );

        let err = coordinator
            .create_challenge(&Challenge::dns01("example.com", "abc"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ChallengeError::Provider(DnsProviderError::PermissionDenied("denied".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_times_out_when_record_never_visible() {
        let mut provider = MockDnsProvider::new();
        provider.expect_upsert_txt().returning(|_, _, _, _| Ok(()));
        let mut resolver = MockTxtResolver::new();
        resolver
            .expect_resolve_txt()
            .times(3)
            .returning(|name| Err(ResolveError::NotFound(name.to_string())));

        let coordinator = Dns01Coordinator::new(
            Arc::new(provider),
            Arc::new(resolver),
            "Z123",
            fast_config(),
        );

        let err = coordinator
            .create_challenge(&Challenge::dns01("example.com", "abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChallengeError::PropagationTimeout { .. }));
    }

    #[tokio::test]
    async fn test_remove_deletes_quoted_value() {
        let mut provider = MockDnsProvider::new();
        provider
            .expect_delete_txt()
            .withf(|zone, name, value| {
                zone == "Z123" && name == "_acme-challenge.example.com." && value == "\"abc\""
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let coordinator = Dns01Coordinator::new(
            Arc::new(provider),
            Arc::new(MockTxtResolver::new()),
            "Z123",
            ChallengeConfig::default(),
        );

        let result = coordinator
            .remove_challenge(&Challenge::dns01("example.com", "abc"))
            .await;
        assert!(result.is_ok());
    }
}

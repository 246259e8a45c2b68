use tokio::time::{sleep, Instant};

use crate::config::ChallengeConfig;
use crate::error::ChallengeError;
use crate::resolver::TxtResolver;

/// wait_for_propagation は record_name の TXT レコードに expected が現れるまでポーリングする。
///
/// - 各レコードの文字列チャンクを連結して比較する（255 バイト超の値に対応）。
/// - 未公開（NotFound）は再試行、それ以外の解決エラーは即座に返す。
/// - propagation_timeout を過ぎても現れなければ PropagationTimeout を返す。
pub async fn wait_for_propagation(
    resolver: &dyn TxtResolver,
    record_name: &str,
    expected: &str,
    config: &ChallengeConfig,
) -> Result<(), ChallengeError> {
    let deadline = Instant::now() + config.propagation_timeout;
    let mut attempts: u32 = 0;

    while Instant::now() < deadline {
        attempts += 1;
        match resolver.resolve_txt(record_name).await {
            Ok(records) => {
                if records.iter().any(|chunks| chunks.concat() == expected) {
                    tracing::info!(record_name, attempts, "TXT record propagated");
                    return Ok(());
                }
                tracing::debug!(record_name, attempts, "TXT record not yet visible");
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(record_name, attempts, error = %e, "TXT record not found yet");
            }
            Err(e) => return Err(ChallengeError::Resolve(e)),
        }
        sleep(config.poll_interval).await;
    }

    tracing::warn!(record_name, attempts, "TXT record propagation timed out");
    Err(ChallengeError::PropagationTimeout {
        record_name: record_name.to_string(),
        timeout: config.propagation_timeout,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::ResolveError;
    use crate::resolver::MockTxtResolver;

    const RECORD: &str = "_acme-challenge.example.com.";

    #[tokio::test(start_paused = true)]
    async fn test_returns_when_value_visible() {
        let mut resolver = MockTxtResolver::new();
        resolver
            .expect_resolve_txt()
            .withf(|name| name == RECORD)
            .times(1)
            .returning(|_| Ok(vec![vec!["other".to_string()], vec!["abc".to_string()]]));

        let result =
            wait_for_propagation(&resolver, RECORD, "abc", &ChallengeConfig::default()).await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concatenates_chunks() {
        let mut resolver = MockTxtResolver::new();
        resolver
            .expect_resolve_txt()
            .returning(|_| Ok(vec![vec!["ab".to_string(), "c".to_string()]]));

        let result =
            wait_for_propagation(&resolver, RECORD, "abc", &ChallengeConfig::default()).await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_not_found_until_visible() {
        let mut resolver = MockTxtResolver::new();
        let mut seq = mockall::Sequence::new();
        resolver
            .expect_resolve_txt()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Err(ResolveError::NotFound(RECORD.to_string())));
        resolver
            .expect_resolve_txt()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![vec!["abc".to_string()]]));

        let start = Instant::now();
        let result =
            wait_for_propagation(&resolver, RECORD, "abc", &ChallengeConfig::default()).await;
        assert!(result.is_ok());
        assert_eq!(start.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_after_sixty_polls() {
        let mut resolver = MockTxtResolver::new();
        resolver
            .expect_resolve_txt()
            .times(60)
            .returning(|_| Err(ResolveError::NotFound(RECORD.to_string())));

        let result =
            wait_for_propagation(&resolver, RECORD, "abc", &ChallengeConfig::default()).await;
        assert_eq!(
            result,
            Err(ChallengeError::PropagationTimeout {
                record_name: RECORD.to_string(),
                timeout: Duration::from_secs(600),
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_resolve_error_fails_immediately() {
        let mut resolver = MockTxtResolver::new();
        resolver
            .expect_resolve_txt()
            .times(1)
            .returning(|_| Err(ResolveError::Failed("SERVFAIL".to_string())));

        let result =
            wait_for_propagation(&resolver, RECORD, "abc", &ChallengeConfig::default()).await;
        assert_eq!(
            result,
            Err(ChallengeError::Resolve(ResolveError::Failed(
                "SERVFAIL".to_string()
            )))
        );
    }
}

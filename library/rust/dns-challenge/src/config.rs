use std::time::Duration;

/// ChallengeConfig は DNS-01 チャレンジのレコード TTL と伝播待ちのポーリング設定を保持する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeConfig {
    pub record_ttl: u32,
    pub poll_interval: Duration,
    pub propagation_timeout: Duration,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            record_ttl: 60,
            poll_interval: Duration::from_secs(10),
            propagation_timeout: Duration::from_secs(600),
        }
    }
}

impl ChallengeConfig {
    pub fn record_ttl(mut self, ttl: u32) -> Self {
        self.record_ttl = ttl;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn propagation_timeout(mut self, timeout: Duration) -> Self {
        self.propagation_timeout = timeout;
        self
    }
}

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use acme_dns_challenge::ChallengeConfig;
use serde::Deserialize;

use crate::domain::entity::KeyConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("設定ファイルを読み込めません ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("設定ファイルの形式が不正です: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("設定値が不正です: {0}")]
    Invalid(String),
}

/// Config はアプリケーション全体の設定。
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub acme: AcmeConfig,
    #[serde(default)]
    pub secret_store: Option<HttpEndpointConfig>,
    #[serde(default)]
    pub dns: DnsConfig,
    #[serde(default)]
    pub parameters: ParametersConfig,
}

/// AppConfig はアプリケーション設定。
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_environment() -> String {
    "dev".to_string()
}

/// ServerConfig はサーバー設定。
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// LogConfig はログ出力設定。format は "json" または "text"。
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

/// AcmeConfig は ACME 関連の既定値。シークレットに値がない場合に使われる。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AcmeConfig {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub directory_url: String,
    #[serde(default)]
    pub account_key: KeyConfig,
    #[serde(default)]
    pub certificate_key: KeyConfig,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_http_timeout_secs() -> u64 {
    30
}

/// HttpEndpointConfig は HTTP API で接続する外部サービスの設定。
#[derive(Debug, Clone, Deserialize)]
pub struct HttpEndpointConfig {
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

impl HttpEndpointConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// DnsConfig は DNS プロバイダと伝播確認の設定。
#[derive(Debug, Clone, Deserialize)]
pub struct DnsConfig {
    #[serde(default)]
    pub provider: Option<HttpEndpointConfig>,
    /// 伝播確認に使うネームサーバ（"host:port"）。空ならシステム設定。
    #[serde(default)]
    pub nameservers: Vec<String>,
    #[serde(default = "default_record_ttl")]
    pub record_ttl: u32,
    #[serde(default = "default_propagation_interval_secs")]
    pub propagation_interval_secs: u64,
    #[serde(default = "default_propagation_timeout_secs")]
    pub propagation_timeout_secs: u64,
}

fn default_record_ttl() -> u32 {
    60
}

fn default_propagation_interval_secs() -> u64 {
    10
}

fn default_propagation_timeout_secs() -> u64 {
    600
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            provider: None,
            nameservers: Vec::new(),
            record_ttl: default_record_ttl(),
            propagation_interval_secs: default_propagation_interval_secs(),
            propagation_timeout_secs: default_propagation_timeout_secs(),
        }
    }
}

impl DnsConfig {
    pub fn challenge_config(&self) -> ChallengeConfig {
        ChallengeConfig::default()
            .record_ttl(self.record_ttl)
            .poll_interval(Duration::from_secs(self.propagation_interval_secs))
            .propagation_timeout(Duration::from_secs(self.propagation_timeout_secs))
    }

    pub fn nameserver_addrs(&self) -> Result<Vec<SocketAddr>, ConfigError> {
        self.nameservers
            .iter()
            .map(|ns| {
                ns.parse::<SocketAddr>()
                    .map_err(|e| ConfigError::Invalid(format!("dns.nameservers: {ns}: {e}")))
            })
            .collect()
    }
}

/// ParametersConfig は階層パラメータの取得元設定。
#[derive(Debug, Clone, Deserialize)]
pub struct ParametersConfig {
    #[serde(default = "default_env_prefix")]
    pub env_prefix: String,
}

fn default_env_prefix() -> String {
    "ACME_PARAM_".to_string()
}

impl Default for ParametersConfig {
    fn default() -> Self {
        Self {
            env_prefix: default_env_prefix(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app.name.trim().is_empty() {
            return Err(ConfigError::Invalid("app.name is empty".to_string()));
        }
        if !matches!(self.log.format.as_str(), "json" | "text") {
            return Err(ConfigError::Invalid(format!(
                "log.format must be json or text: {}",
                self.log.format
            )));
        }
        if self.dns.propagation_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "dns.propagation_interval_secs must be positive".to_string(),
            ));
        }
        if self.dns.propagation_timeout_secs < self.dns.propagation_interval_secs {
            return Err(ConfigError::Invalid(
                "dns.propagation_timeout_secs must not be shorter than the interval".to_string(),
            ));
        }
        if !self.acme.directory_url.is_empty() {
            url::Url::parse(&self.acme.directory_url).map_err(|e| {
                ConfigError::Invalid(format!("acme.directory_url: {e}"))
            })?;
        }
        for endpoint in self.secret_store.iter().chain(self.dns.provider.iter()) {
            url::Url::parse(&endpoint.base_url)
                .map_err(|e| ConfigError::Invalid(format!("{}: {e}", endpoint.base_url)))?;
        }
        self.dns.nameserver_addrs()?;
        Ok(())
    }
}

use std::net::SocketAddr;

use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfig, Protocol, ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::TokioAsyncResolver;

use crate::error::ResolveError;

/// TxtResolver は TXT レコードを問い合わせる。
/// 戻り値はレコードごとの文字列チャンクの一覧（255 バイト単位で分割されたもの）。
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait TxtResolver: Send + Sync {
    async fn resolve_txt(&self, name: &str) -> Result<Vec<Vec<String>>, ResolveError>;
}

/// HickoryTxtResolver は hickory-resolver を使用する TxtResolver 実装。
/// ネームサーバ未指定時はシステム設定（/etc/resolv.conf）を使用する。
pub struct HickoryTxtResolver {
    nameservers: Vec<SocketAddr>,
}

impl HickoryTxtResolver {
    pub fn from_system_conf() -> Self {
        Self {
            nameservers: Vec::new(),
        }
    }

    /// 問い合わせ先ネームサーバ（権威サーバ等）を明示する。
    pub fn with_nameservers(nameservers: Vec<SocketAddr>) -> Self {
        Self { nameservers }
    }

    fn build(&self) -> Result<TokioAsyncResolver, ResolveError> {
        let (config, mut opts) = if self.nameservers.is_empty() {
            hickory_resolver::system_conf::read_system_conf()
                .map_err(|e| ResolveError::Failed(format!("failed to read system dns config: {e}")))?
        } else {
            let mut config = ResolverConfig::new();
            for addr in &self.nameservers {
                config.add_name_server(NameServerConfig::new(*addr, Protocol::Udp));
                config.add_name_server(NameServerConfig::new(*addr, Protocol::Tcp));
            }
            (config, ResolverOpts::default())
        };
        // ポーリング間で否定応答をキャッシュしない
        opts.cache_size = 0;
        Ok(TokioAsyncResolver::tokio(config, opts))
    }
}

#[async_trait]
impl TxtResolver for HickoryTxtResolver {
    async fn resolve_txt(&self, name: &str) -> Result<Vec<Vec<String>>, ResolveError> {
        let resolver = self.build()?;
        match resolver.txt_lookup(name).await {
            Ok(lookup) => Ok(lookup
                .iter()
                .map(|txt| {
                    txt.txt_data()
                        .iter()
                        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
                        .collect()
                })
                .collect()),
            Err(e) => match e.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => Err(ResolveError::NotFound(format!(
                    "{name}: {e}"
                ))),
                _ => Err(ResolveError::Failed(format!("{name}: {e}"))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_nameservers_builds_resolver() {
        let addr: SocketAddr = "127.0.0.1:53".parse().unwrap();
        let resolver = HickoryTxtResolver::with_nameservers(vec![addr]);
        assert_eq!(resolver.nameservers.len(), 1);
    }

    #[test]
    fn test_from_system_conf_has_no_explicit_nameservers() {
        let resolver = HickoryTxtResolver::from_system_conf();
        assert!(resolver.nameservers.is_empty());
    }
}

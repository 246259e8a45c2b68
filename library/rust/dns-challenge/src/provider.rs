use async_trait::async_trait;

use crate::error::DnsProviderError;

/// DnsProvider はホストゾーンへの TXT レコード登録・削除を行う。
/// value は DNS プロバイダへそのまま渡す文字列（引用符付き）である。
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait DnsProvider: Send + Sync {
    async fn upsert_txt(
        &self,
        zone_id: &str,
        name: &str,
        value: &str,
        ttl: u32,
    ) -> Result<(), DnsProviderError>;

    async fn delete_txt(&self, zone_id: &str, name: &str, value: &str)
        -> Result<(), DnsProviderError>;
}

/// TXT レコード値を DNS プロバイダ向けに引用符で囲む。
pub fn quote_txt_value(value: &str) -> String {
    format!("\"{value}\"")
}

/// 引用符で囲まれた TXT レコード値を元に戻す。
pub fn unquote_txt_value(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_txt_value() {
        assert_eq!(quote_txt_value("abc"), "\"abc\"");
    }

    #[test]
    fn test_unquote_txt_value() {
        assert_eq!(unquote_txt_value("\"abc\""), "abc");
        assert_eq!(unquote_txt_value("abc"), "abc");
        assert_eq!(unquote_txt_value("\"abc"), "\"abc");
    }
}

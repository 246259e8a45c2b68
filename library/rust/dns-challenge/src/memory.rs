use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{DnsProviderError, ResolveError};
use crate::provider::{unquote_txt_value, DnsProvider};
use crate::resolver::TxtResolver;

/// DnsOperation は InMemoryDns に対して行われたレコード操作の記録。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsOperation {
    Upsert {
        zone_id: String,
        name: String,
        value: String,
        ttl: u32,
    },
    Delete {
        zone_id: String,
        name: String,
        value: String,
    },
}

/// InMemoryDns は DNS プロバイダとリゾルバを兼ねるインメモリ実装。
/// 登録したレコードは即座に解決可能になる。開発環境・テスト用。
#[derive(Default)]
pub struct InMemoryDns {
    records: RwLock<HashMap<String, Vec<String>>>,
    operations: RwLock<Vec<DnsOperation>>,
}

impl InMemoryDns {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn operations(&self) -> Vec<DnsOperation> {
        self.operations.read().await.clone()
    }

    pub async fn records(&self, name: &str) -> Vec<String> {
        self.records
            .read()
            .await
            .get(name)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl DnsProvider for InMemoryDns {
    async fn upsert_txt(
        &self,
        zone_id: &str,
        name: &str,
        value: &str,
        ttl: u32,
    ) -> Result<(), DnsProviderError> {
        self.operations.write().await.push(DnsOperation::Upsert {
            zone_id: zone_id.to_string(),
            name: name.to_string(),
            value: value.to_string(),
            ttl,
        });
        let mut records = self.records.write().await;
        let values = records.entry(name.to_string()).or_default();
        let value = unquote_txt_value(value).to_string();
        if !values.contains(&value) {
            values.push(value);
        }
        Ok(())
    }

    async fn delete_txt(
        &self,
        zone_id: &str,
        name: &str,
        value: &str,
    ) -> Result<(), DnsProviderError> {
        self.operations.write().await.push(DnsOperation::Delete {
            zone_id: zone_id.to_string(),
            name: name.to_string(),
            value: value.to_string(),
        });
        let mut records = self.records.write().await;
        let unquoted = unquote_txt_value(value);
        if let Some(values) = records.get_mut(name) {
            values.retain(|v| v != unquoted);
            if values.is_empty() {
                records.remove(name);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TxtResolver for InMemoryDns {
    async fn resolve_txt(&self, name: &str) -> Result<Vec<Vec<String>>, ResolveError> {
        match self.records.read().await.get(name) {
            Some(values) => Ok(values.iter().map(|v| vec![v.clone()]).collect()),
            None => Err(ResolveError::NotFound(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_then_resolve() {
        let dns = InMemoryDns::new();
        dns.upsert_txt("Z1", "_acme-challenge.example.com.", "\"abc\"", 60)
            .await
            .unwrap();

        let records = dns.resolve_txt("_acme-challenge.example.com.").await.unwrap();
        assert_eq!(records, vec![vec!["abc".to_string()]]);
    }

    #[tokio::test]
    async fn test_resolve_missing_is_not_found() {
        let dns = InMemoryDns::new();
        let err = dns.resolve_txt("_acme-challenge.example.com.").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_removes_record_and_records_operations() {
        let dns = InMemoryDns::new();
        dns.upsert_txt("Z1", "_acme-challenge.example.com.", "\"abc\"", 60)
            .await
            .unwrap();
        dns.delete_txt("Z1", "_acme-challenge.example.com.", "\"abc\"")
            .await
            .unwrap();

        assert!(dns.records("_acme-challenge.example.com.").await.is_empty());
        let ops = dns.operations().await;
        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[1], DnsOperation::Delete { .. }));
    }
}

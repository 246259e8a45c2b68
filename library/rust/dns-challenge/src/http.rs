use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use url::Url;

use crate::error::DnsProviderError;
use crate::provider::DnsProvider;

#[derive(Serialize)]
struct UpsertTxtRequest<'a> {
    name: &'a str,
    value: &'a str,
    ttl: u32,
}

#[derive(Serialize)]
struct DeleteTxtRequest<'a> {
    name: &'a str,
    value: &'a str,
}

/// HttpDnsProvider は DNS 管理 API（`/zones/{zone_id}/txt`）経由で TXT レコードを操作する。
pub struct HttpDnsProvider {
    base_url: Url,
    token: Option<String>,
    http: reqwest::Client,
}

impl HttpDnsProvider {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, DnsProviderError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| DnsProviderError::Server(format!("invalid base url {base_url}: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DnsProviderError::Server(e.to_string()))?;
        Ok(Self {
            base_url,
            token,
            http,
        })
    }

    fn txt_url(&self, zone_id: &str) -> Result<Url, DnsProviderError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| DnsProviderError::Server(format!("invalid base url: {}", self.base_url)))?
            .pop_if_empty()
            .extend(["zones", zone_id, "txt"]);
        Ok(url)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

fn map_status(status: StatusCode, zone_id: &str) -> DnsProviderError {
    match status {
        StatusCode::NOT_FOUND => DnsProviderError::ZoneNotFound(zone_id.to_string()),
        StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => {
            DnsProviderError::PermissionDenied(zone_id.to_string())
        }
        status => DnsProviderError::Server(format!("unexpected status: {status}")),
    }
}

#[async_trait]
impl DnsProvider for HttpDnsProvider {
    async fn upsert_txt(
        &self,
        zone_id: &str,
        name: &str,
        value: &str,
        ttl: u32,
    ) -> Result<(), DnsProviderError> {
        let url = self.txt_url(zone_id)?;
        let resp = self
            .authorize(self.http.put(url))
            .json(&UpsertTxtRequest { name, value, ttl })
            .send()
            .await
            .map_err(|e| DnsProviderError::Server(e.to_string()))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(map_status(resp.status(), zone_id))
        }
    }

    async fn delete_txt(
        &self,
        zone_id: &str,
        name: &str,
        value: &str,
    ) -> Result<(), DnsProviderError> {
        let url = self.txt_url(zone_id)?;
        let resp = self
            .authorize(self.http.delete(url))
            .json(&DeleteTxtRequest { name, value })
            .send()
            .await
            .map_err(|e| DnsProviderError::Server(e.to_string()))?;

        match resp.status() {
            // 既に削除済み
            StatusCode::NOT_FOUND => {
                tracing::debug!(zone_id, name, "TXT record already absent");
                Ok(())
            }
            status if status.is_success() => Ok(()),
            status => Err(map_status(status, zone_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_provider(url: &str, token: Option<&str>) -> HttpDnsProvider {
        HttpDnsProvider::new(url, token.map(str::to_string), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_txt_success() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/zones/Z123/txt"))
            .and(header("authorization", "Bearer t0ken"))
            .and(body_json(serde_json::json!({
                "name": "_acme-challenge.example.com.",
                "value": "\"abc\"",
                "ttl": 60
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let provider = make_provider(&server.uri(), Some("t0ken"));
        provider
            .upsert_txt("Z123", "_acme-challenge.example.com.", "\"abc\"", 60)
            .await
            .unwrap();
        server.verify().await;
    }

    #[tokio::test]
    async fn test_upsert_txt_zone_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/zones/missing/txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let provider = make_provider(&server.uri(), None);
        let err = provider
            .upsert_txt("missing", "_acme-challenge.example.com.", "\"abc\"", 60)
            .await
            .unwrap_err();
        assert_eq!(err, DnsProviderError::ZoneNotFound("missing".to_string()));
    }

    #[tokio::test]
    async fn test_upsert_txt_permission_denied() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let provider = make_provider(&server.uri(), None);
        let err = provider
            .upsert_txt("Z123", "_acme-challenge.example.com.", "\"abc\"", 60)
            .await
            .unwrap_err();
        assert!(matches!(err, DnsProviderError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_delete_txt_tolerates_missing_record() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/zones/Z123/txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let provider = make_provider(&server.uri(), None);
        let result = provider
            .delete_txt("Z123", "_acme-challenge.example.com.", "\"abc\"")
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_delete_txt_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let provider = make_provider(&server.uri(), None);
        let err = provider
            .delete_txt("Z123", "_acme-challenge.example.com.", "\"abc\"")
            .await
            .unwrap_err();
        assert!(matches!(err, DnsProviderError::Server(_)));
    }

    #[test]
    fn test_txt_url_with_base_path() {
        let provider = make_provider("http://dns.internal/api/v1/", None);
        let url = provider.txt_url("Z 1").unwrap();
        assert_eq!(url.as_str(), "http://dns.internal/api/v1/zones/Z%201/txt");
    }
}

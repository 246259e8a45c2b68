use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::entity::{SecretVersion, StageUpdate, VersionStage};
use crate::domain::repository::{SecretStore, SecretStoreError};

#[derive(Deserialize)]
struct SecretValueResponse {
    secret_string: String,
}

#[derive(Serialize)]
struct PutVersionRequest<'a> {
    secret_string: &'a str,
    stages: Vec<&'static str>,
}

#[derive(Deserialize)]
struct ListVersionsResponse {
    #[serde(default)]
    versions: Option<Vec<SecretVersion>>,
}

#[derive(Serialize)]
struct MoveStageRequest<'a> {
    move_to_version_id: Option<&'a str>,
    remove_from_version_id: Option<&'a str>,
}

/// HttpSecretStore はシークレット管理 API（`/secrets/{id}`）経由でバージョンを操作する。
pub struct HttpSecretStore {
    base_url: Url,
    token: Option<String>,
    http: reqwest::Client,
}

impl HttpSecretStore {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SecretStoreError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            SecretStoreError::Unavailable(format!("invalid base url {base_url}: {e}"))
        })?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SecretStoreError::Unavailable(e.to_string()))?;
        Ok(Self {
            base_url,
            token,
            http,
        })
    }

    fn url(&self, secret_id: &str, rest: &[&str]) -> Result<Url, SecretStoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                SecretStoreError::Unavailable(format!("invalid base url: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(["secrets", secret_id])
            .extend(rest);
        Ok(url)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(
        &self,
        req: reqwest::RequestBuilder,
        target: &str,
    ) -> Result<reqwest::Response, SecretStoreError> {
        let resp = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| SecretStoreError::Unavailable(e.to_string()))?;
        match resp.status() {
            s if s.is_success() => Ok(resp),
            StatusCode::NOT_FOUND => Err(SecretStoreError::NotFound(target.to_string())),
            StatusCode::CONFLICT => Err(SecretStoreError::AlreadyExists(target.to_string())),
            status => Err(SecretStoreError::Unavailable(format!(
                "{target}: unexpected status: {status}"
            ))),
        }
    }
}

#[async_trait]
impl SecretStore for HttpSecretStore {
    async fn get(&self, secret_id: &str, stage: VersionStage) -> Result<String, SecretStoreError> {
        let mut url = self.url(secret_id, &[])?;
        url.query_pairs_mut().append_pair("stage", stage.label());

        let resp = self
            .send(self.http.get(url), &format!("{secret_id} ({stage})"))
            .await?;
        let body: SecretValueResponse = resp
            .json()
            .await
            .map_err(|e| SecretStoreError::Unavailable(e.to_string()))?;
        Ok(body.secret_string)
    }

    async fn put(
        &self,
        secret_id: &str,
        token: &str,
        secret_string: &str,
        stages: &[VersionStage],
    ) -> Result<(), SecretStoreError> {
        let url = self.url(secret_id, &["versions", token])?;
        let body = PutVersionRequest {
            secret_string,
            stages: stages.iter().map(VersionStage::label).collect(),
        };
        self.send(self.http.put(url).json(&body), &format!("{secret_id}/{token}"))
            .await?;
        tracing::debug!(secret_id, token, "secret version stored");
        Ok(())
    }

    async fn list_versions(
        &self,
        secret_id: &str,
    ) -> Result<Option<Vec<SecretVersion>>, SecretStoreError> {
        let url = self.url(secret_id, &["versions"])?;
        let resp = self.send(self.http.get(url), secret_id).await?;
        let body: ListVersionsResponse = resp
            .json()
            .await
            .map_err(|e| SecretStoreError::Unavailable(e.to_string()))?;
        Ok(body.versions)
    }

    async fn move_stage(
        &self,
        secret_id: &str,
        update: &StageUpdate,
    ) -> Result<(), SecretStoreError> {
        let url = self.url(secret_id, &["stages", update.stage.label()])?;
        let body = MoveStageRequest {
            move_to_version_id: update.move_to_version.as_deref(),
            remove_from_version_id: update.remove_from_version.as_deref(),
        };
        self.send(self.http.post(url).json(&body), secret_id).await?;
        tracing::debug!(secret_id, stage = %update.stage, "secret stage moved");
        Ok(())
    }
}

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::entity::{SecretVersion, StageUpdate, VersionStage};
use crate::domain::repository::{SecretStore, SecretStoreError};

#[derive(Debug, Clone)]
struct StoredVersion {
    version_id: String,
    secret_string: String,
    stages: Vec<VersionStage>,
}

/// InMemorySecretStore はプロセス内でバージョンとステージを管理するストア。
/// 1 つのステージは 1 シークレット内で高々 1 つのバージョンにだけ付く。
#[derive(Default)]
pub struct InMemorySecretStore {
    secrets: RwLock<HashMap<String, Vec<StoredVersion>>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// seed は secret_id に AWSCURRENT のバージョンを登録する。
    pub async fn seed(&self, secret_id: &str, version_id: &str, secret_string: &str) {
        let mut secrets = self.secrets.write().await;
        let versions = secrets.entry(secret_id.to_string()).or_default();
        detach_stage(versions, VersionStage::Current);
        versions.push(StoredVersion {
            version_id: version_id.to_string(),
            secret_string: secret_string.to_string(),
            stages: vec![VersionStage::Current],
        });
    }

    /// version は指定バージョンの値を返す。
    pub async fn version(&self, secret_id: &str, version_id: &str) -> Option<String> {
        let secrets = self.secrets.read().await;
        secrets
            .get(secret_id)?
            .iter()
            .find(|v| v.version_id == version_id)
            .map(|v| v.secret_string.clone())
    }
}

fn detach_stage(versions: &mut [StoredVersion], stage: VersionStage) {
    for v in versions.iter_mut() {
        v.stages.retain(|s| *s != stage);
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get(&self, secret_id: &str, stage: VersionStage) -> Result<String, SecretStoreError> {
        let secrets = self.secrets.read().await;
        secrets
            .get(secret_id)
            .and_then(|versions| versions.iter().find(|v| v.stages.contains(&stage)))
            .map(|v| v.secret_string.clone())
            .ok_or_else(|| SecretStoreError::NotFound(format!("{secret_id} ({stage})")))
    }

    async fn put(
        &self,
        secret_id: &str,
        token: &str,
        secret_string: &str,
        stages: &[VersionStage],
    ) -> Result<(), SecretStoreError> {
        let mut secrets = self.secrets.write().await;
        let versions = secrets.entry(secret_id.to_string()).or_default();

        if let Some(existing) = versions.iter().find(|v| v.version_id == token) {
            if existing.secret_string == secret_string {
                return Err(SecretStoreError::AlreadyExists(format!("{secret_id}/{token}")));
            }
        }
        for stage in stages {
            detach_stage(versions, *stage);
        }
        match versions.iter_mut().find(|v| v.version_id == token) {
            Some(existing) => {
                existing.secret_string = secret_string.to_string();
                for stage in stages {
                    if !existing.stages.contains(stage) {
                        existing.stages.push(*stage);
                    }
                }
            }
            None => versions.push(StoredVersion {
                version_id: token.to_string(),
                secret_string: secret_string.to_string(),
                stages: stages.to_vec(),
            }),
        }
        Ok(())
    }

    async fn list_versions(
        &self,
        secret_id: &str,
    ) -> Result<Option<Vec<SecretVersion>>, SecretStoreError> {
        let secrets = self.secrets.read().await;
        let versions = secrets
            .get(secret_id)
            .ok_or_else(|| SecretStoreError::NotFound(secret_id.to_string()))?;
        Ok(Some(
            versions
                .iter()
                .map(|v| SecretVersion {
                    version_id: v.version_id.clone(),
                    stages: v.stages.iter().map(|s| s.label().to_string()).collect(),
                })
                .collect(),
        ))
    }

    async fn move_stage(
        &self,
        secret_id: &str,
        update: &StageUpdate,
    ) -> Result<(), SecretStoreError> {
        let mut secrets = self.secrets.write().await;
        let versions = secrets
            .get_mut(secret_id)
            .ok_or_else(|| SecretStoreError::NotFound(secret_id.to_string()))?;

        if let Some(to) = &update.move_to_version {
            if !versions.iter().any(|v| &v.version_id == to) {
                return Err(SecretStoreError::NotFound(format!("{secret_id}/{to}")));
            }
        }
        if let Some(from) = &update.remove_from_version {
            if let Some(v) = versions.iter_mut().find(|v| &v.version_id == from) {
                v.stages.retain(|s| *s != update.stage);
            }
        }
        if let Some(to) = &update.move_to_version {
            detach_stage(versions, update.stage);
            if let Some(v) = versions.iter_mut().find(|v| &v.version_id == to) {
                v.stages.push(update.stage);
            }
        }
        Ok(())
    }
}

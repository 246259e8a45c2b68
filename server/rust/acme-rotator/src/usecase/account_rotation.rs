use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::entity::{AccountRecord, KeyConfig, RotationEvent, VersionStage};
use crate::domain::error::RotationError;
use crate::domain::repository::{
    AcmeClientFactory, KeyGenerator, SecretStore, SecretStoreError,
};
use crate::domain::service::{decode_account, encode_account};
use crate::infrastructure::key_generator::inspect_private_key;
use crate::usecase::{pending_version_exists, write_back_pending, RotationWorkflow};

/// AccountSettings はアカウントローテーションの設定値。
#[derive(Debug, Clone, Default)]
pub struct AccountSettings {
    pub email: String,
    /// レコードの directoryUrl が空のときに使う
    pub directory_url: String,
    /// レコードの keyConfig が空のときに使う
    pub key_config: KeyConfig,
}

impl AccountSettings {
    fn contact(&self) -> Vec<String> {
        if self.email.is_empty() {
            Vec::new()
        } else {
            vec![format!("mailto:{}", self.email)]
        }
    }

    /// seed_record は current がまだ無いシークレットの初回ローテーション用のレコード。
    fn seed_record(&self) -> AccountRecord {
        AccountRecord {
            key_config: self.key_config.clone(),
            account_object: serde_json::Value::Null,
            directory_url: self.directory_url.clone(),
            account_key: String::new(),
        }
    }
}

/// AccountRotationWorkflow は ACME アカウント鍵をローテーションする。
pub struct AccountRotationWorkflow {
    store: Arc<dyn SecretStore>,
    key_generator: Arc<dyn KeyGenerator>,
    acme: Arc<dyn AcmeClientFactory>,
    settings: AccountSettings,
}

impl AccountRotationWorkflow {
    pub fn new(
        store: Arc<dyn SecretStore>,
        key_generator: Arc<dyn KeyGenerator>,
        acme: Arc<dyn AcmeClientFactory>,
        settings: AccountSettings,
    ) -> Self {
        Self {
            store,
            key_generator,
            acme,
            settings,
        }
    }

    fn directory_url<'a>(&'a self, record: &'a AccountRecord) -> Result<&'a str, RotationError> {
        if !record.directory_url.is_empty() {
            Ok(&record.directory_url)
        } else if !self.settings.directory_url.is_empty() {
            Ok(&self.settings.directory_url)
        } else {
            Err(RotationError::MissingField("directoryUrl".to_string()))
        }
    }

    /// current を読む。未作成（NotFound）の場合は None。
    async fn read_current(&self, secret_id: &str) -> Result<Option<AccountRecord>, RotationError> {
        match self.store.get(secret_id, VersionStage::Current).await {
            Ok(raw) => Ok(Some(decode_account(&raw)?)),
            Err(SecretStoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_pending(&self, secret_id: &str) -> Result<AccountRecord, RotationError> {
        let raw = self.store.get(secret_id, VersionStage::Pending).await?;
        decode_account(&raw)
    }
}

#[async_trait]
impl RotationWorkflow for AccountRotationWorkflow {
    fn name(&self) -> &'static str {
        "account"
    }

    async fn create_secret(&self, event: &RotationEvent) -> Result<(), RotationError> {
        if pending_version_exists(self.store.as_ref(), event).await? {
            tracing::info!("pending version already exists, skipping createSecret");
            return Ok(());
        }

        let current = match self.read_current(&event.secret_id).await? {
            Some(current) => current,
            None => {
                tracing::info!("no current account version, starting from configured settings");
                self.settings.seed_record()
            }
        };

        let key_config = current.key_config.or(&self.settings.key_config).clone();
        let new_key = self.key_generator.generate(&key_config).await?;

        let pending = AccountRecord {
            account_key: new_key,
            ..current
        };
        match self
            .store
            .put(
                &event.secret_id,
                &event.client_request_token,
                &encode_account(&pending)?,
                &[VersionStage::Pending],
            )
            .await
        {
            Ok(()) => {
                tracing::info!(key_spec = ?key_config.resolve(), "new account key stored as pending");
                Ok(())
            }
            Err(SecretStoreError::AlreadyExists(_)) => {
                tracing::info!("pending version already stored");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn set_secret(&self, event: &RotationEvent) -> Result<(), RotationError> {
        let (current, mut pending) = tokio::try_join!(
            self.read_current(&event.secret_id),
            self.read_pending(&event.secret_id),
        )?;

        if !pending.has_account_key() {
            return Err(RotationError::MissingField("key".to_string()));
        }

        let account_object = match current.filter(AccountRecord::has_account_key) {
            None => {
                tracing::info!("no existing account key, creating ACME account");
                let client = self
                    .acme
                    .connect(self.directory_url(&pending)?, &pending.account_key)
                    .await?;
                client.create_account(&self.settings.contact()).await?
            }
            Some(current) => {
                tracing::info!("updating ACME account key");
                let client = self
                    .acme
                    .connect(self.directory_url(&current)?, &current.account_key)
                    .await?;
                client.update_account_key(&pending.account_key).await?
            }
        };

        if !account_object.is_null() {
            pending.account_object = account_object;
        }
        write_back_pending(self.store.as_ref(), event, &encode_account(&pending)?).await
    }

    async fn test_secret(&self, event: &RotationEvent) -> Result<(), RotationError> {
        let pending = self.read_pending(&event.secret_id).await?;
        inspect_private_key(&pending.account_key)
            .map_err(|e| RotationError::MalformedSecret(e.to_string()))?;
        tracing::info!("pending account key is a valid private key");
        Ok(())
    }
}

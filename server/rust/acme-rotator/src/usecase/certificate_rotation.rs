use std::sync::Arc;

use acme_dns_challenge::{
    ChallengeConfig, Dns01Coordinator, DnsProvider, TxtResolver, DNS01_CHALLENGE,
};
use async_trait::async_trait;

use crate::domain::entity::{CertificateRecord, KeyConfig, RotationEvent, VersionStage};
use crate::domain::error::RotationError;
use crate::domain::repository::{
    AcmeClientFactory, IssueRequest, KeyGenerator, SecretStore, SecretStoreError,
};
use crate::domain::service::{decode_account, decode_certificate, encode_certificate};
use crate::usecase::{pending_version_exists, write_back_pending, RotationWorkflow};

/// CertificateRotationWorkflow は DNS-01 検証で証明書を再発行する。
pub struct CertificateRotationWorkflow {
    store: Arc<dyn SecretStore>,
    key_generator: Arc<dyn KeyGenerator>,
    acme: Arc<dyn AcmeClientFactory>,
    dns_provider: Arc<dyn DnsProvider>,
    resolver: Arc<dyn TxtResolver>,
    challenge_config: ChallengeConfig,
    default_key_config: KeyConfig,
}

impl CertificateRotationWorkflow {
    pub fn new(
        store: Arc<dyn SecretStore>,
        key_generator: Arc<dyn KeyGenerator>,
        acme: Arc<dyn AcmeClientFactory>,
        dns_provider: Arc<dyn DnsProvider>,
        resolver: Arc<dyn TxtResolver>,
    ) -> Self {
        Self {
            store,
            key_generator,
            acme,
            dns_provider,
            resolver,
            challenge_config: ChallengeConfig::default(),
            default_key_config: KeyConfig::default(),
        }
    }

    pub fn with_challenge_config(mut self, config: ChallengeConfig) -> Self {
        self.challenge_config = config;
        self
    }

    pub fn with_default_key_config(mut self, config: KeyConfig) -> Self {
        self.default_key_config = config;
        self
    }

    async fn read(&self, secret_id: &str, stage: VersionStage) -> Result<CertificateRecord, RotationError> {
        let raw = self.store.get(secret_id, stage).await?;
        decode_certificate(&raw)
    }

    /// createSecret 用。同じ内容のバージョンが既にあれば成功とみなす。
    async fn write_pending(
        &self,
        event: &RotationEvent,
        record: &CertificateRecord,
    ) -> Result<(), RotationError> {
        match self
            .store
            .put(
                &event.secret_id,
                &event.client_request_token,
                &encode_certificate(record)?,
                &[VersionStage::Pending],
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(SecretStoreError::AlreadyExists(_)) => {
                tracing::info!("pending version already stored");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl RotationWorkflow for CertificateRotationWorkflow {
    fn name(&self) -> &'static str {
        "certificate"
    }

    async fn create_secret(&self, event: &RotationEvent) -> Result<(), RotationError> {
        if pending_version_exists(self.store.as_ref(), event).await? {
            tracing::info!("pending version already exists, skipping createSecret");
            return Ok(());
        }

        let current = self.read(&event.secret_id, VersionStage::Current).await?;
        let key_config = current.key_config.or(&self.default_key_config).clone();
        let certificate_key = self.key_generator.generate(&key_config).await?;

        let pending = CertificateRecord {
            certificate_key,
            certificate_chain: String::new(),
            ..current
        };
        self.write_pending(event, &pending).await?;
        tracing::info!(
            domain = %pending.domain,
            key_spec = ?key_config.resolve(),
            "new certificate key stored as pending"
        );
        Ok(())
    }

    async fn set_secret(&self, event: &RotationEvent) -> Result<(), RotationError> {
        let mut pending = self.read(&event.secret_id, VersionStage::Pending).await?;
        if pending.has_certificate_chain() {
            tracing::info!("pending version already has a certificate chain, skipping setSecret");
            return Ok(());
        }
        if !pending.has_certificate_key() {
            return Err(RotationError::MissingField("key".to_string()));
        }

        let account = decode_account(
            &self
                .store
                .get(&pending.account_secret_id, VersionStage::Current)
                .await?,
        )?;
        if !account.has_account_key() {
            return Err(RotationError::MissingField(format!(
                "{}: key",
                pending.account_secret_id
            )));
        }

        let client = self
            .acme
            .connect(&account.directory_url, &account.account_key)
            .await?;
        let csr = client.create_csr(&pending.domain, &pending.certificate_key)?;

        let coordinator = Dns01Coordinator::new(
            self.dns_provider.clone(),
            self.resolver.clone(),
            pending.dns_zone_id.clone(),
            self.challenge_config.clone(),
        );
        let request = IssueRequest {
            domain: pending.domain.clone(),
            csr,
            challenge_priority: vec![DNS01_CHALLENGE.to_string()],
        };

        tracing::info!(
            domain = %pending.domain,
            zone_id = %coordinator.zone_id(),
            "issuing certificate"
        );
        pending.certificate_chain = client.auto(&request, &coordinator).await?;

        write_back_pending(self.store.as_ref(), event, &encode_certificate(&pending)?).await?;
        tracing::info!(domain = %pending.domain, "certificate chain stored in pending version");
        Ok(())
    }

    async fn test_secret(&self, event: &RotationEvent) -> Result<(), RotationError> {
        let pending = self.read(&event.secret_id, VersionStage::Pending).await?;
        if !pending.has_certificate_key() {
            return Err(RotationError::MissingField("key".to_string()));
        }
        if !pending.certificate_chain.contains("-----BEGIN CERTIFICATE-----") {
            return Err(RotationError::MissingField("crt".to_string()));
        }
        tracing::info!(domain = %pending.domain, "pending certificate is complete");
        Ok(())
    }
}

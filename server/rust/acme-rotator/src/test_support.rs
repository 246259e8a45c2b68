//! テスト用の ACME フェイクと AppState 組み立て。

use std::sync::{Arc, Mutex};

use acme_dns_challenge::{Challenge, ChallengeHandler, InMemoryDns, DNS01_CHALLENGE};
use async_trait::async_trait;

use crate::adapter::handler::AppState;
use crate::adapter::repository::InMemorySecretStore;
use crate::domain::entity::{EcCurve, KeyConfig};
use crate::domain::repository::{AcmeClient, AcmeClientFactory, AcmeError, IssueRequest};
use crate::infrastructure::key_generator::PemKeyGenerator;
use crate::usecase::{
    AccountRotationWorkflow, AccountSettings, CertificateRotationWorkflow, RotateSecretUseCase,
};

/// AcmeCall は RecordingAcmeFactory が記録する呼び出し。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcmeCall {
    Connect {
        directory_url: String,
        account_key: String,
    },
    CreateAccount {
        contact: Vec<String>,
    },
    UpdateAccountKey {
        new_key: String,
    },
    CreateCsr {
        common_name: String,
    },
    Auto {
        domain: String,
        challenge_priority: Vec<String>,
    },
}

/// RecordingAcmeFactory は ACME サーバなしで呼び出しを記録するフェイク。
/// auto はチャレンジハンドラを実際に呼び、作成の成否に関わらず削除も呼ぶ。
pub struct RecordingAcmeFactory {
    calls: Arc<Mutex<Vec<AcmeCall>>>,
    chain: String,
    offered_challenge: String,
}

impl Default for RecordingAcmeFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingAcmeFactory {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            chain: "-----BEGIN CERTIFICATE-----\nTEST\n-----END CERTIFICATE-----\n".to_string(),
            offered_challenge: DNS01_CHALLENGE.to_string(),
        }
    }

    pub fn with_chain(mut self, chain: &str) -> Self {
        self.chain = chain.to_string();
        self
    }

    pub fn with_offered_challenge(mut self, challenge_type: &str) -> Self {
        self.offered_challenge = challenge_type.to_string();
        self
    }

    pub fn calls(&self) -> Vec<AcmeCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

fn record(calls: &Mutex<Vec<AcmeCall>>, call: AcmeCall) {
    if let Ok(mut calls) = calls.lock() {
        calls.push(call);
    }
}

#[async_trait]
impl AcmeClientFactory for RecordingAcmeFactory {
    async fn connect(
        &self,
        directory_url: &str,
        account_key_pem: &str,
    ) -> Result<Arc<dyn AcmeClient>, AcmeError> {
        record(
            &self.calls,
            AcmeCall::Connect {
                directory_url: directory_url.to_string(),
                account_key: account_key_pem.to_string(),
            },
        );
        Ok(Arc::new(RecordingAcmeClient {
            calls: self.calls.clone(),
            chain: self.chain.clone(),
            offered_challenge: self.offered_challenge.clone(),
        }))
    }
}

struct RecordingAcmeClient {
    calls: Arc<Mutex<Vec<AcmeCall>>>,
    chain: String,
    offered_challenge: String,
}

#[async_trait]
impl AcmeClient for RecordingAcmeClient {
    async fn create_account(&self, contact: &[String]) -> Result<serde_json::Value, AcmeError> {
        record(
            &self.calls,
            AcmeCall::CreateAccount {
                contact: contact.to_vec(),
            },
        );
        Ok(serde_json::json!({"status": "valid"}))
    }

    async fn update_account_key(
        &self,
        new_key_pem: &str,
    ) -> Result<serde_json::Value, AcmeError> {
        record(
            &self.calls,
            AcmeCall::UpdateAccountKey {
                new_key: new_key_pem.to_string(),
            },
        );
        Ok(serde_json::json!({"status": "valid"}))
    }

    fn create_csr(&self, common_name: &str, _key_pem: &str) -> Result<Vec<u8>, AcmeError> {
        record(
            &self.calls,
            AcmeCall::CreateCsr {
                common_name: common_name.to_string(),
            },
        );
        Ok(b"csr".to_vec())
    }

    async fn auto(
        &self,
        request: &IssueRequest,
        handler: &dyn ChallengeHandler,
    ) -> Result<String, AcmeError> {
        record(
            &self.calls,
            AcmeCall::Auto {
                domain: request.domain.clone(),
                challenge_priority: request.challenge_priority.clone(),
            },
        );

        let challenge = Challenge {
            challenge_type: self.offered_challenge.clone(),
            domain: request.domain.clone(),
            key_authorization: format!("ka-{}", request.domain),
        };
        let created = handler.create_challenge(&challenge).await;
        if let Err(e) = handler.remove_challenge(&challenge).await {
            tracing::warn!(error = %e, "failed to remove challenge");
        }
        created?;
        Ok(self.chain.clone())
    }
}

/// TestContext はテスト用 AppState とその依存を保持する。
pub struct TestContext {
    pub state: AppState,
    pub store: Arc<InMemorySecretStore>,
    pub acme: Arc<RecordingAcmeFactory>,
    pub dns: Arc<InMemoryDns>,
}

/// make_test_app_state はインメモリのストア・DNS と RecordingAcmeFactory で AppState を組み立てる。
pub fn make_test_app_state() -> TestContext {
    let store = Arc::new(InMemorySecretStore::new());
    let acme = Arc::new(RecordingAcmeFactory::new());
    let dns = Arc::new(InMemoryDns::new());
    let keys = Arc::new(PemKeyGenerator::new());

    let account = AccountRotationWorkflow::new(
        store.clone(),
        keys.clone(),
        acme.clone(),
        AccountSettings {
            email: "ops@example.com".to_string(),
            directory_url: "https://acme.example.com/directory".to_string(),
            key_config: KeyConfig::ecdsa(EcCurve::P256),
        },
    );
    let certificate =
        CertificateRotationWorkflow::new(store.clone(), keys, acme.clone(), dns.clone(), dns.clone());

    let state = AppState {
        account_rotation: Arc::new(RotateSecretUseCase::new(store.clone(), Arc::new(account))),
        certificate_rotation: Arc::new(RotateSecretUseCase::new(
            store.clone(),
            Arc::new(certificate),
        )),
    };

    TestContext {
        state,
        store,
        acme,
        dns,
    }
}

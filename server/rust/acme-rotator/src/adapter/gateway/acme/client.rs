use std::sync::Arc;
use std::time::Duration;

use acme_dns_challenge::{Challenge, ChallengeHandler, DNS01_CHALLENGE};
use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE, LOCATION};
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;

use super::jws::{b64, dns01_value, key_authorization, sign_jws, AccountSigner, KeyId};
use super::protocol::{
    Authorization, ChallengeObject, Directory, FinalizeRequest, Identifier, NewAccountRequest,
    NewOrderRequest, Order, Problem, BAD_NONCE, STATUS_INVALID, STATUS_VALID,
};
use crate::domain::repository::{AcmeClient, AcmeClientFactory, AcmeError, IssueRequest};

const JOSE_JSON: &str = "application/jose+json";
const PEM_CHAIN: &str = "application/pem-certificate-chain";
const REPLAY_NONCE: &str = "replay-nonce";

/// PollConfig はオーダー・認可のステータス確認の間隔と回数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_attempts: 20,
        }
    }
}

/// HttpAcmeClientFactory は reqwest で RFC 8555 を話す AcmeClient を作る。
#[derive(Clone)]
pub struct HttpAcmeClientFactory {
    http: reqwest::Client,
    poll: PollConfig,
}

impl HttpAcmeClientFactory {
    pub fn new(timeout: Duration) -> Result<Self, AcmeError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("acme-rotator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AcmeError::Http(e.to_string()))?;
        Ok(Self {
            http,
            poll: PollConfig::default(),
        })
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }
}

#[async_trait]
impl AcmeClientFactory for HttpAcmeClientFactory {
    async fn connect(
        &self,
        directory_url: &str,
        account_key_pem: &str,
    ) -> Result<Arc<dyn AcmeClient>, AcmeError> {
        let signer = AccountSigner::from_pem(account_key_pem)?;

        let resp = self
            .http
            .get(directory_url)
            .send()
            .await
            .map_err(|e| AcmeError::Directory(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(AcmeError::Directory(format!(
                "{directory_url}: status {}",
                resp.status()
            )));
        }
        let directory: Directory = resp
            .json()
            .await
            .map_err(|e| AcmeError::Directory(e.to_string()))?;

        tracing::debug!(directory_url = %directory_url, alg = signer.alg(), "connected to ACME directory");

        Ok(Arc::new(HttpAcmeClient {
            http: self.http.clone(),
            directory,
            signer,
            poll: self.poll,
            kid: OnceCell::new(),
        }))
    }
}

/// HttpAcmeClient は 1 つのアカウント鍵で署名する ACME クライアント。
pub struct HttpAcmeClient {
    http: reqwest::Client,
    directory: Directory,
    signer: AccountSigner,
    poll: PollConfig,
    kid: OnceCell<String>,
}

impl HttpAcmeClient {
    async fn nonce(&self) -> Result<String, AcmeError> {
        let resp = self
            .http
            .head(&self.directory.new_nonce)
            .send()
            .await
            .map_err(|e| AcmeError::Http(e.to_string()))?;
        header_string(&resp, REPLAY_NONCE)
            .ok_or_else(|| AcmeError::Http("newNonce returned no replay-nonce".to_string()))
    }

    /// post は JWS で署名した POST を送る。badNonce は 1 回だけ再送する。
    async fn post(
        &self,
        signer: &AccountSigner,
        key_id: &KeyId<'_>,
        url: &str,
        payload: Option<&serde_json::Value>,
        accept: Option<&str>,
    ) -> Result<reqwest::Response, AcmeError> {
        let mut retried = false;
        loop {
            let nonce = self.nonce().await?;
            let jws = sign_jws(signer, key_id, Some(&nonce), url, payload)?;
            let body = serde_json::to_vec(&jws).map_err(|e| AcmeError::Http(e.to_string()))?;

            let mut req = self
                .http
                .post(url)
                .header(CONTENT_TYPE, HeaderValue::from_static(JOSE_JSON))
                .body(body);
            if let Some(accept) = accept {
                req = req.header(ACCEPT, accept);
            }
            let resp = req
                .send()
                .await
                .map_err(|e| AcmeError::Http(e.to_string()))?;

            if resp.status().is_success() {
                return Ok(resp);
            }
            let err = problem_error(resp).await;
            let bad_nonce = matches!(
                &err,
                AcmeError::Problem { problem_type, .. } if problem_type == BAD_NONCE
            );
            if !bad_nonce || retried {
                return Err(err);
            }
            tracing::debug!(url = %url, "badNonce, retrying");
            retried = true;
        }
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        kid: &str,
        url: &str,
        payload: Option<&serde_json::Value>,
    ) -> Result<T, AcmeError> {
        let resp = self
            .post(&self.signer, &KeyId::Kid(kid), url, payload, None)
            .await?;
        resp.json()
            .await
            .map_err(|e| AcmeError::Http(format!("{url}: {e}")))
    }

    /// account_url は kid を返す。未取得なら onlyReturnExisting で既存アカウントを引く。
    async fn account_url(&self) -> Result<String, AcmeError> {
        let kid = self
            .kid
            .get_or_try_init(|| async {
                let payload = to_value(&NewAccountRequest {
                    terms_of_service_agreed: None,
                    contact: &[],
                    only_return_existing: Some(true),
                })?;
                let resp = self
                    .post(
                        &self.signer,
                        &KeyId::Jwk,
                        &self.directory.new_account,
                        Some(&payload),
                        None,
                    )
                    .await?;
                location(&resp)
            })
            .await?;
        Ok(kid.clone())
    }

    async fn poll_authorization(
        &self,
        kid: &str,
        url: &str,
    ) -> Result<Authorization, AcmeError> {
        for _ in 0..self.poll.max_attempts {
            let authz: Authorization = self.post_json(kid, url, None).await?;
            match authz.status.as_str() {
                STATUS_VALID => return Ok(authz),
                STATUS_INVALID => {
                    let detail = authz
                        .challenges
                        .iter()
                        .find_map(|c| c.error.as_ref())
                        .map(ToString::to_string)
                        .unwrap_or_default();
                    return Err(AcmeError::OrderFailed(format!(
                        "authorization for {} is invalid: {detail}",
                        authz.identifier.value
                    )));
                }
                _ => tokio::time::sleep(self.poll.interval).await,
            }
        }
        Err(AcmeError::Timeout(url.to_string()))
    }

    async fn poll_order(&self, kid: &str, url: &str) -> Result<Order, AcmeError> {
        for _ in 0..self.poll.max_attempts {
            let order: Order = self.post_json(kid, url, None).await?;
            match order.status.as_str() {
                STATUS_VALID => return Ok(order),
                STATUS_INVALID => {
                    return Err(AcmeError::OrderFailed(
                        order.error.map(|e| e.to_string()).unwrap_or_default(),
                    ))
                }
                _ => tokio::time::sleep(self.poll.interval).await,
            }
        }
        Err(AcmeError::Timeout(url.to_string()))
    }

    /// 1 つの認可を検証する。チャレンジ作成後は成否に関わらず削除を呼ぶ。
    async fn authorize(
        &self,
        kid: &str,
        authz_url: &str,
        priority: &[String],
        handler: &dyn ChallengeHandler,
    ) -> Result<(), AcmeError> {
        let authz: Authorization = self.post_json(kid, authz_url, None).await?;
        if authz.status == STATUS_VALID {
            return Ok(());
        }

        let selected = select_challenge(&authz.challenges, priority).ok_or_else(|| {
            AcmeError::OrderFailed(format!(
                "no challenge offered for {}",
                authz.identifier.value
            ))
        })?;

        let thumbprint = self.signer.thumbprint();
        let key_auth = if selected.ty == DNS01_CHALLENGE {
            dns01_value(&selected.token, &thumbprint)
        } else {
            key_authorization(&selected.token, &thumbprint)
        };
        let challenge = Challenge {
            challenge_type: selected.ty.clone(),
            domain: authz.identifier.value.clone(),
            key_authorization: key_auth,
        };

        let result = async {
            handler.create_challenge(&challenge).await?;
            self.post(
                &self.signer,
                &KeyId::Kid(kid),
                &selected.url,
                Some(&serde_json::json!({})),
                None,
            )
            .await?;
            self.poll_authorization(kid, authz_url).await.map(|_| ())
        }
        .await;

        if let Err(e) = handler.remove_challenge(&challenge).await {
            tracing::warn!(
                domain = %challenge.domain,
                challenge_type = %challenge.challenge_type,
                error = %e,
                "failed to remove challenge"
            );
        }
        result
    }
}

#[async_trait]
impl AcmeClient for HttpAcmeClient {
    async fn create_account(&self, contact: &[String]) -> Result<serde_json::Value, AcmeError> {
        let payload = to_value(&NewAccountRequest {
            terms_of_service_agreed: Some(true),
            contact,
            only_return_existing: None,
        })?;
        let resp = self
            .post(
                &self.signer,
                &KeyId::Jwk,
                &self.directory.new_account,
                Some(&payload),
                None,
            )
            .await?;
        let kid = location(&resp)?;
        let account = resp
            .json::<serde_json::Value>()
            .await
            .map_err(|e| AcmeError::Http(e.to_string()))?;

        tracing::info!(kid = %kid, "ACME account registered");
        // 同じクライアントで以降の kid 付きリクエストを送れるようにする
        let _ = self.kid.set(kid);
        Ok(account)
    }

    async fn update_account_key(
        &self,
        new_key_pem: &str,
    ) -> Result<serde_json::Value, AcmeError> {
        let key_change = self
            .directory
            .key_change
            .clone()
            .ok_or_else(|| AcmeError::Directory("keyChange is not supported".to_string()))?;
        let new_signer = AccountSigner::from_pem(new_key_pem)?;
        let kid = self.account_url().await?;

        // 内側の JWS は新しい鍵で署名し nonce を持たない
        let inner = sign_jws(
            &new_signer,
            &KeyId::Jwk,
            None,
            &key_change,
            Some(&serde_json::json!({
                "account": kid,
                "oldKey": self.signer.jwk(),
            })),
        )?;
        let inner = to_value(&inner)?;

        let resp = self
            .post(&self.signer, &KeyId::Kid(&kid), &key_change, Some(&inner), None)
            .await?;
        tracing::info!(kid = %kid, alg = new_signer.alg(), "ACME account key changed");

        let body = resp.text().await.map_err(|e| AcmeError::Http(e.to_string()))?;
        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| AcmeError::Http(e.to_string()))
    }

    fn create_csr(&self, common_name: &str, key_pem: &str) -> Result<Vec<u8>, AcmeError> {
        let key = rcgen::KeyPair::from_pem(key_pem).map_err(|e| AcmeError::Csr(e.to_string()))?;
        let mut params = rcgen::CertificateParams::new(vec![common_name.to_string()])
            .map_err(|e| AcmeError::Csr(e.to_string()))?;
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, common_name);
        let csr = params
            .serialize_request(&key)
            .map_err(|e| AcmeError::Csr(e.to_string()))?;
        Ok(csr.der().to_vec())
    }

    async fn auto(
        &self,
        request: &IssueRequest,
        handler: &dyn ChallengeHandler,
    ) -> Result<String, AcmeError> {
        let kid = self.account_url().await?;

        let payload = to_value(&NewOrderRequest {
            identifiers: vec![Identifier::dns(&request.domain)],
        })?;
        let resp = self
            .post(
                &self.signer,
                &KeyId::Kid(&kid),
                &self.directory.new_order,
                Some(&payload),
                None,
            )
            .await?;
        let order_url = location(&resp)?;
        let order: Order = resp
            .json()
            .await
            .map_err(|e| AcmeError::Http(e.to_string()))?;
        tracing::info!(domain = %request.domain, order_url = %order_url, "ACME order created");

        for authz_url in &order.authorizations {
            self.authorize(&kid, authz_url, &request.challenge_priority, handler)
                .await?;
        }

        let finalize = to_value(&FinalizeRequest {
            csr: b64(&request.csr),
        })?;
        self.post(
            &self.signer,
            &KeyId::Kid(&kid),
            &order.finalize,
            Some(&finalize),
            None,
        )
        .await?;

        let order = self.poll_order(&kid, &order_url).await?;
        let certificate_url = order
            .certificate
            .ok_or_else(|| AcmeError::OrderFailed("valid order has no certificate".to_string()))?;

        let resp = self
            .post(
                &self.signer,
                &KeyId::Kid(&kid),
                &certificate_url,
                None,
                Some(PEM_CHAIN),
            )
            .await?;
        let chain = resp.text().await.map_err(|e| AcmeError::Http(e.to_string()))?;
        tracing::info!(domain = %request.domain, "certificate issued");
        Ok(chain)
    }
}

/// select_challenge は優先順に一致するチャレンジを選び、なければ最初に提示されたものを返す。
fn select_challenge<'a>(
    offered: &'a [ChallengeObject],
    priority: &[String],
) -> Option<&'a ChallengeObject> {
    priority
        .iter()
        .find_map(|ty| offered.iter().find(|c| &c.ty == ty))
        .or_else(|| offered.first())
}

fn header_string(resp: &reqwest::Response, name: &str) -> Option<String> {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn location(resp: &reqwest::Response) -> Result<String, AcmeError> {
    header_string(resp, LOCATION.as_str())
        .ok_or_else(|| AcmeError::Http(format!("{}: missing Location header", resp.url())))
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, AcmeError> {
    serde_json::to_value(value).map_err(|e| AcmeError::Http(e.to_string()))
}

async fn problem_error(resp: reqwest::Response) -> AcmeError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let problem: Problem = serde_json::from_str(&body).unwrap_or_default();
    AcmeError::Problem {
        status: status.as_u16(),
        problem_type: if problem.ty.is_empty() {
            status.canonical_reason().unwrap_or("unknown").to_string()
        } else {
            problem.ty
        },
        detail: if problem.detail.is_empty() { body } else { problem.detail },
    }
}

//! シークレット値（JSON 文字列）と AccountRecord / CertificateRecord の相互変換。
//!
//! keyConfig とアカウントオブジェクトは外側の JSON の中に JSON 文字列として入れ子で格納する。
//! 外側の未知フィールドは無視するが、入れ子の keyConfig は厳密に解析する。

use serde::{Deserialize, Serialize};

use crate::domain::entity::{AccountRecord, CertificateRecord, KeyConfig};
use crate::domain::error::RotationError;

#[derive(Serialize, Deserialize)]
struct AccountEnvelope {
    #[serde(rename = "keyConfig", default)]
    key_config: Option<String>,
    #[serde(default)]
    object: Option<String>,
    #[serde(rename = "directoryUrl")]
    directory_url: String,
    #[serde(default, alias = "accountKey")]
    key: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct CertificateEnvelope {
    #[serde(rename = "keyConfig", default)]
    key_config: Option<String>,
    domain: String,
    #[serde(rename = "hostedZoneId")]
    hosted_zone_id: String,
    #[serde(rename = "accountSecretId", alias = "AccountSecretId")]
    account_secret_id: String,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    crt: Option<String>,
}

fn decode_key_config(raw: Option<&str>) -> Result<KeyConfig, RotationError> {
    match raw {
        None => Ok(KeyConfig::default()),
        Some(s) if s.trim().is_empty() => Ok(KeyConfig::default()),
        Some(s) => serde_json::from_str(s)
            .map_err(|e| RotationError::MalformedSecret(format!("keyConfig: {e}"))),
    }
}

fn encode_key_config(config: &KeyConfig) -> Result<String, RotationError> {
    serde_json::to_string(config)
        .map_err(|e| RotationError::MalformedSecret(format!("keyConfig: {e}")))
}

pub fn decode_account(raw: &str) -> Result<AccountRecord, RotationError> {
    let envelope: AccountEnvelope = serde_json::from_str(raw)
        .map_err(|e| RotationError::MalformedSecret(format!("account: {e}")))?;

    let account_object = match envelope.object.as_deref() {
        None => serde_json::Value::Null,
        Some(s) => serde_json::from_str(s)
            .map_err(|e| RotationError::MalformedSecret(format!("object: {e}")))?,
    };

    Ok(AccountRecord {
        key_config: decode_key_config(envelope.key_config.as_deref())?,
        account_object,
        directory_url: envelope.directory_url,
        account_key: envelope.key.unwrap_or_default(),
    })
}

pub fn encode_account(record: &AccountRecord) -> Result<String, RotationError> {
    let object = serde_json::to_string(&record.account_object)
        .map_err(|e| RotationError::MalformedSecret(format!("object: {e}")))?;
    let envelope = AccountEnvelope {
        key_config: Some(encode_key_config(&record.key_config)?),
        object: Some(object),
        directory_url: record.directory_url.clone(),
        key: Some(record.account_key.clone()),
    };
    serde_json::to_string(&envelope)
        .map_err(|e| RotationError::MalformedSecret(format!("account: {e}")))
}

pub fn decode_certificate(raw: &str) -> Result<CertificateRecord, RotationError> {
    let envelope: CertificateEnvelope = serde_json::from_str(raw)
        .map_err(|e| RotationError::MalformedSecret(format!("certificate: {e}")))?;

    Ok(CertificateRecord {
        key_config: decode_key_config(envelope.key_config.as_deref())?,
        domain: envelope.domain,
        dns_zone_id: envelope.hosted_zone_id,
        account_secret_id: envelope.account_secret_id,
        certificate_key: envelope.key.unwrap_or_default(),
        certificate_chain: envelope.crt.unwrap_or_default(),
    })
}

pub fn encode_certificate(record: &CertificateRecord) -> Result<String, RotationError> {
    let envelope = CertificateEnvelope {
        key_config: Some(encode_key_config(&record.key_config)?),
        domain: record.domain.clone(),
        hosted_zone_id: record.dns_zone_id.clone(),
        account_secret_id: record.account_secret_id.clone(),
        key: Some(record.certificate_key.clone()),
        crt: Some(record.certificate_chain.clone()),
    };
    serde_json::to_string(&envelope)
        .map_err(|e| RotationError::MalformedSecret(format!("certificate: {e}")))
}

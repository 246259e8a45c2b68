use async_trait::async_trait;
use p256::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::RsaPrivateKey;

use crate::domain::entity::{EcCurve, KeyConfig, KeySpec};
use crate::domain::repository::{KeyGenerationError, KeyGenerator};

const MIN_RSA_KEY_SIZE: u32 = 2048;
const MAX_RSA_KEY_SIZE: u32 = 8192;

/// PemKeyGenerator は OS 乱数を使って PKCS#8 PEM 形式の秘密鍵を生成する。
#[derive(Debug, Clone, Default)]
pub struct PemKeyGenerator;

impl PemKeyGenerator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl KeyGenerator for PemKeyGenerator {
    async fn generate(&self, config: &KeyConfig) -> Result<String, KeyGenerationError> {
        match config.resolve() {
            KeySpec::Ecdsa { curve } => generate_ecdsa(curve),
            KeySpec::Rsa { bits } => {
                if !(MIN_RSA_KEY_SIZE..=MAX_RSA_KEY_SIZE).contains(&bits) {
                    return Err(KeyGenerationError::Unsupported(format!("rsa {bits}")));
                }
                // RSA 鍵生成は重いためブロッキングスレッドで行う
                tokio::task::spawn_blocking(move || generate_rsa(bits))
                    .await
                    .map_err(|e| KeyGenerationError::Failed(e.to_string()))?
            }
        }
    }
}

fn generate_ecdsa(curve: EcCurve) -> Result<String, KeyGenerationError> {
    let pem = match curve {
        EcCurve::P256 => p256::SecretKey::random(&mut OsRng).to_pkcs8_pem(LineEnding::LF),
        EcCurve::P384 => p384::SecretKey::random(&mut OsRng).to_pkcs8_pem(LineEnding::LF),
    };
    pem.map(|p| p.to_string())
        .map_err(|e| KeyGenerationError::Failed(e.to_string()))
}

fn generate_rsa(bits: u32) -> Result<String, KeyGenerationError> {
    let key = RsaPrivateKey::new(&mut OsRng, bits as usize)
        .map_err(|e| KeyGenerationError::Failed(e.to_string()))?;
    key.to_pkcs8_pem(LineEnding::LF)
        .map(|p| p.to_string())
        .map_err(|e| KeyGenerationError::Failed(e.to_string()))
}

/// ParsedKey は PEM から読み込んだ署名用秘密鍵。
pub enum ParsedKey {
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
    Rsa(Box<RsaPrivateKey>),
}

impl ParsedKey {
    pub fn spec(&self) -> KeySpec {
        match self {
            ParsedKey::P256(_) => KeySpec::Ecdsa {
                curve: EcCurve::P256,
            },
            ParsedKey::P384(_) => KeySpec::Ecdsa {
                curve: EcCurve::P384,
            },
            ParsedKey::Rsa(key) => KeySpec::Rsa {
                bits: u32::try_from(rsa::traits::PublicKeyParts::size(key.as_ref()) * 8)
                    .unwrap_or(u32::MAX),
            },
        }
    }
}

/// parse_private_key は PKCS#8 / SEC1 / PKCS#1 の PEM を解析する。
pub fn parse_private_key(pem: &str) -> Result<ParsedKey, KeyGenerationError> {
    let pem = pem.trim();
    if pem.is_empty() {
        return Err(KeyGenerationError::InvalidKey("empty key".to_string()));
    }

    if let Ok(key) = p256::ecdsa::SigningKey::from_pkcs8_pem(pem) {
        return Ok(ParsedKey::P256(key));
    }
    if let Ok(key) = p384::ecdsa::SigningKey::from_pkcs8_pem(pem) {
        return Ok(ParsedKey::P384(key));
    }
    if let Ok(key) = RsaPrivateKey::from_pkcs8_pem(pem) {
        return Ok(ParsedKey::Rsa(Box::new(key)));
    }
    if let Ok(key) = p256::SecretKey::from_sec1_pem(pem) {
        return Ok(ParsedKey::P256(key.into()));
    }
    if let Ok(key) = p384::SecretKey::from_sec1_pem(pem) {
        return Ok(ParsedKey::P384(key.into()));
    }
    if let Ok(key) = RsaPrivateKey::from_pkcs1_pem(pem) {
        return Ok(ParsedKey::Rsa(Box::new(key)));
    }

    Err(KeyGenerationError::InvalidKey(
        "unsupported or malformed private key".to_string(),
    ))
}

/// inspect_private_key は PEM が利用可能な秘密鍵かを確認し、その種別を返す。
pub fn inspect_private_key(pem: &str) -> Result<KeySpec, KeyGenerationError> {
    parse_private_key(pem).map(|key| key.spec())
}

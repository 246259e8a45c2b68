use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_RSA_KEY_SIZE: u32 = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    Rsa,
    Ecdsa,
}

/// EcCurve は JWS 署名と CSR の両方で扱える曲線だけを持つ。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EcCurve {
    #[serde(rename = "P-256")]
    P256,
    #[serde(rename = "P-384")]
    P384,
}

impl EcCurve {
    pub fn name(&self) -> &'static str {
        match self {
            EcCurve::P256 => "P-256",
            EcCurve::P384 => "P-384",
        }
    }
}

impl fmt::Display for EcCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// KeyConfig は秘密鍵の生成パラメータ。未指定の項目は既定値で補う。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyConfig {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub key_type: Option<KeyType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<EcCurve>,
    #[serde(rename = "keySize", default, skip_serializing_if = "Option::is_none")]
    pub key_size: Option<u32>,
}

/// KeySpec は既定値を解決した後の具体的な鍵種別。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySpec {
    Rsa { bits: u32 },
    Ecdsa { curve: EcCurve },
}

impl KeyConfig {
    pub fn rsa(bits: u32) -> Self {
        Self {
            key_type: Some(KeyType::Rsa),
            curve: None,
            key_size: Some(bits),
        }
    }

    pub fn ecdsa(curve: EcCurve) -> Self {
        Self {
            key_type: Some(KeyType::Ecdsa),
            curve: Some(curve),
            key_size: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.key_type.is_none() && self.curve.is_none() && self.key_size.is_none()
    }

    /// 種別未指定は RSA 2048、ecdsa で曲線未指定は P-256、rsa でサイズ未指定は 2048。
    pub fn resolve(&self) -> KeySpec {
        match self.key_type {
            Some(KeyType::Ecdsa) => KeySpec::Ecdsa {
                curve: self.curve.unwrap_or(EcCurve::P256),
            },
            Some(KeyType::Rsa) => KeySpec::Rsa {
                bits: self.key_size.unwrap_or(DEFAULT_RSA_KEY_SIZE),
            },
            None => KeySpec::Rsa {
                bits: DEFAULT_RSA_KEY_SIZE,
            },
        }
    }

    /// self が空なら fallback を使う。
    pub fn or<'a>(&'a self, fallback: &'a KeyConfig) -> &'a KeyConfig {
        if self.is_empty() {
            fallback
        } else {
            self
        }
    }
}

//! ACME リクエスト用の JWS（flattened JSON serialization）と JWK。

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use p256::ecdsa::signature::Signer;
use rsa::traits::PublicKeyParts;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::domain::repository::AcmeError;
use crate::infrastructure::key_generator::{parse_private_key, ParsedKey};

pub fn b64(data: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// AccountSigner はアカウント鍵による署名を行う。
pub struct AccountSigner {
    key: ParsedKey,
}

impl AccountSigner {
    pub fn from_pem(pem: &str) -> Result<Self, AcmeError> {
        let key = parse_private_key(pem).map_err(|e| AcmeError::InvalidKey(e.to_string()))?;
        Ok(Self { key })
    }

    pub fn alg(&self) -> &'static str {
        match self.key {
            ParsedKey::P256(_) => "ES256",
            ParsedKey::P384(_) => "ES384",
            ParsedKey::Rsa(_) => "RS256",
        }
    }

    /// RFC 7638 の必須メンバー（名前と base64url 値）。
    fn jwk_members(&self) -> Vec<(&'static str, String)> {
        match &self.key {
            ParsedKey::P256(key) => {
                let point = key.verifying_key().to_encoded_point(false);
                ec_members(
                    "P-256",
                    point.x().map(|x| x.as_slice()),
                    point.y().map(|y| y.as_slice()),
                )
            }
            ParsedKey::P384(key) => {
                let point = key.verifying_key().to_encoded_point(false);
                ec_members(
                    "P-384",
                    point.x().map(|x| x.as_slice()),
                    point.y().map(|y| y.as_slice()),
                )
            }
            ParsedKey::Rsa(key) => vec![
                ("e", b64(key.e().to_bytes_be())),
                ("kty", "RSA".to_string()),
                ("n", b64(key.n().to_bytes_be())),
            ],
        }
    }

    pub fn jwk(&self) -> serde_json::Value {
        self.jwk_members()
            .into_iter()
            .map(|(name, value)| (name.to_string(), serde_json::Value::String(value)))
            .collect::<serde_json::Map<_, _>>()
            .into()
    }

    /// JWK サムプリント（base64url(SHA-256(canonical JWK))）。
    pub fn thumbprint(&self) -> String {
        jwk_thumbprint(&self.jwk_members())
    }

    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, AcmeError> {
        let signature = match &self.key {
            ParsedKey::P256(key) => {
                let sig: p256::ecdsa::Signature = key
                    .try_sign(message)
                    .map_err(|e| AcmeError::InvalidKey(e.to_string()))?;
                sig.to_bytes().to_vec()
            }
            ParsedKey::P384(key) => {
                let sig: p384::ecdsa::Signature = key
                    .try_sign(message)
                    .map_err(|e| AcmeError::InvalidKey(e.to_string()))?;
                sig.to_bytes().to_vec()
            }
            ParsedKey::Rsa(key) => {
                let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new(key.as_ref().clone());
                let sig = rsa::signature::Signer::try_sign(&signing_key, message)
                    .map_err(|e| AcmeError::InvalidKey(e.to_string()))?;
                rsa::signature::SignatureEncoding::to_vec(&sig)
            }
        };
        Ok(signature)
    }
}

fn ec_members(crv: &str, x: Option<&[u8]>, y: Option<&[u8]>) -> Vec<(&'static str, String)> {
    vec![
        ("crv", crv.to_string()),
        ("kty", "EC".to_string()),
        ("x", b64(x.unwrap_or_default())),
        ("y", b64(y.unwrap_or_default())),
    ]
}

/// RFC 7638 の canonical JSON（空白なし・メンバー名の辞書順）から求めたサムプリント。
/// 値は base64url と固定文字列だけなのでエスケープは不要。
pub fn jwk_thumbprint(members: &[(&str, String)]) -> String {
    let mut sorted: Vec<_> = members.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let body = sorted
        .iter()
        .map(|(name, value)| format!(r#""{name}":"{value}""#))
        .collect::<Vec<_>>()
        .join(",");
    b64(Sha256::digest(format!("{{{body}}}").as_bytes()))
}

/// KeyId は protected header で鍵を示す方法。
pub enum KeyId<'a> {
    /// newAccount / keyChange の内側 JWS で公開鍵そのものを埋め込む
    Jwk,
    /// アカウント URL
    Kid(&'a str),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FlattenedJws {
    pub protected: String,
    pub payload: String,
    pub signature: String,
}

/// sign_jws は protected header と payload に署名する。payload が None の場合は POST-as-GET。
pub fn sign_jws(
    signer: &AccountSigner,
    key_id: &KeyId<'_>,
    nonce: Option<&str>,
    url: &str,
    payload: Option<&serde_json::Value>,
) -> Result<FlattenedJws, AcmeError> {
    let mut header = serde_json::json!({
        "alg": signer.alg(),
        "url": url,
    });
    match key_id {
        KeyId::Jwk => header["jwk"] = signer.jwk(),
        KeyId::Kid(kid) => header["kid"] = serde_json::Value::String((*kid).to_string()),
    }
    if let Some(nonce) = nonce {
        header["nonce"] = serde_json::Value::String(nonce.to_string());
    }

    let protected = b64(header.to_string());
    let payload = match payload {
        Some(p) => b64(p.to_string()),
        None => String::new(),
    };
    let signature = b64(signer.sign(format!("{protected}.{payload}").as_bytes())?);

    Ok(FlattenedJws {
        protected,
        payload,
        signature,
    })
}

pub fn key_authorization(token: &str, thumbprint: &str) -> String {
    format!("{token}.{thumbprint}")
}

/// dns-01 の TXT レコード値（base64url(SHA-256(key authorization))）。
pub fn dns01_value(token: &str, thumbprint: &str) -> String {
    b64(Sha256::digest(key_authorization(token, thumbprint).as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::pkcs8::{EncodePrivateKey, LineEnding};

    fn p256_pem() -> String {
        p256::SecretKey::random(&mut rand::rngs::OsRng)
            .to_pkcs8_pem(LineEnding::LF)
            .unwrap()
            .to_string()
    }

    fn decode(s: &str) -> serde_json::Value {
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(s).unwrap()).unwrap()
    }

    #[test]
    fn test_p256_jwk_members() {
        let signer = AccountSigner::from_pem(&p256_pem()).unwrap();
        assert_eq!(signer.alg(), "ES256");
        let jwk = signer.jwk();
        assert_eq!(jwk["kty"], "EC");
        assert_eq!(jwk["crv"], "P-256");
        // 32 バイト座標の base64url は 43 文字
        assert_eq!(jwk["x"].as_str().unwrap().len(), 43);
        assert_eq!(jwk["y"].as_str().unwrap().len(), 43);
    }

    #[test]
    fn test_thumbprint_is_stable_and_canonical() {
        let signer = AccountSigner::from_pem(&p256_pem()).unwrap();
        assert_eq!(signer.thumbprint(), signer.thumbprint());
        assert_eq!(signer.thumbprint().len(), 43);

        let jwk = signer.jwk();
        let members: Vec<(&str, String)> = ["crv", "kty", "x", "y"]
            .into_iter()
            .map(|name| (name, jwk[name].as_str().unwrap().to_string()))
            .collect();
        assert_eq!(signer.thumbprint(), jwk_thumbprint(&members));
    }

    #[test]
    fn test_thumbprint_matches_rfc7638_example() {
        // RFC 7638 3.1 の RSA 鍵。メンバー順を崩して渡す
        let members = [
            ("n", "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw".to_string()),
            ("kty", "RSA".to_string()),
            ("e", "AQAB".to_string()),
        ];
        assert_eq!(
            jwk_thumbprint(&members),
            "NzbLsXh8uDCcd-6MNwXF4W_7noWXFZAfHkxZsRGC9Xs"
        );
    }

    #[test]
    fn test_sign_jws_with_kid() {
        let signer = AccountSigner::from_pem(&p256_pem()).unwrap();
        let payload = serde_json::json!({"identifiers": []});
        let jws = sign_jws(
            &signer,
            &KeyId::Kid("https://acme.example.com/acct/1"),
            Some("nonce-1"),
            "https://acme.example.com/new-order",
            Some(&payload),
        )
        .unwrap();

        let header = decode(&jws.protected);
        assert_eq!(header["alg"], "ES256");
        assert_eq!(header["kid"], "https://acme.example.com/acct/1");
        assert_eq!(header["nonce"], "nonce-1");
        assert!(header.get("jwk").is_none());
        assert_eq!(decode(&jws.payload), payload);
        // ES256 署名は r||s の 64 バイト
        assert_eq!(URL_SAFE_NO_PAD.decode(&jws.signature).unwrap().len(), 64);
    }

    #[test]
    fn test_sign_jws_post_as_get_with_jwk() {
        let signer = AccountSigner::from_pem(&p256_pem()).unwrap();
        let jws = sign_jws(&signer, &KeyId::Jwk, None, "https://acme.example.com/x", None).unwrap();
        let header = decode(&jws.protected);
        assert_eq!(header["jwk"]["kty"], "EC");
        assert!(header.get("nonce").is_none());
        assert_eq!(jws.payload, "");
    }

    #[test]
    fn test_dns01_value() {
        // RFC 8555 8.4: base64url(SHA-256("token.thumbprint"))
        let expected = b64(Sha256::digest(b"tok.thumb"));
        assert_eq!(dns01_value("tok", "thumb"), expected);
        assert_eq!(key_authorization("tok", "thumb"), "tok.thumb");
    }

    #[test]
    fn test_from_pem_rejects_invalid_key() {
        assert!(matches!(
            AccountSigner::from_pem("garbage"),
            Err(AcmeError::InvalidKey(_))
        ));
    }
}

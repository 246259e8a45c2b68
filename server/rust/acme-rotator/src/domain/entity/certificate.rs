use std::fmt;

use crate::domain::entity::key_config::KeyConfig;

/// CertificateRecord は証明書シークレットの内容。
/// account_secret_id は参照先アカウントシークレットの ID で、このレコードからは読み取りのみ行う。
#[derive(Clone, PartialEq, Eq)]
pub struct CertificateRecord {
    pub key_config: KeyConfig,
    pub domain: String,
    pub dns_zone_id: String,
    pub account_secret_id: String,
    pub certificate_key: String,
    pub certificate_chain: String,
}

impl CertificateRecord {
    pub fn has_certificate_key(&self) -> bool {
        !self.certificate_key.trim().is_empty()
    }

    pub fn has_certificate_chain(&self) -> bool {
        !self.certificate_chain.trim().is_empty()
    }
}

impl fmt::Debug for CertificateRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateRecord")
            .field("key_config", &self.key_config)
            .field("domain", &self.domain)
            .field("dns_zone_id", &self.dns_zone_id)
            .field("account_secret_id", &self.account_secret_id)
            .field(
                "certificate_key",
                &if self.has_certificate_key() { "[REDACTED]" } else { "" },
            )
            .field("certificate_chain_len", &self.certificate_chain.len())
            .finish()
    }
}

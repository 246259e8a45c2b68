//! 階層パラメータ（`email`, `accountKey/type` のようなパス形式のキー）を AcmeConfig に反映する。

use crate::domain::entity::{EcCurve, KeyConfig, KeyType};
use crate::infrastructure::config::{AcmeConfig, ConfigError};

/// merge_parameters はフラットなキー・値の一覧を AcmeConfig に上書きする。
/// キーはパス区切り `/` の階層で、大文字小文字を区別しない。未知のキーは警告して無視する。
pub fn merge_parameters(
    acme: &mut AcmeConfig,
    params: &[(String, String)],
) -> Result<(), ConfigError> {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    for (key, value) in sorted {
        let path: Vec<String> = key
            .trim_matches('/')
            .split('/')
            .map(str::to_ascii_lowercase)
            .collect();

        match path.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
            ["email"] => acme.email = value.clone(),
            ["directoryurl"] => acme.directory_url = value.clone(),
            // 旧名称（acountkey / privetekey）も受け付ける
            ["accountkey" | "acountkey", field] => {
                apply_key_field(&mut acme.account_key, field, value, key)?;
            }
            ["privatekey" | "privetekey", field] => {
                apply_key_field(&mut acme.certificate_key, field, value, key)?;
            }
            _ => tracing::warn!(key = %key, "unknown parameter ignored"),
        }
    }
    Ok(())
}

fn apply_key_field(
    config: &mut KeyConfig,
    field: &str,
    value: &str,
    key: &str,
) -> Result<(), ConfigError> {
    let invalid = || ConfigError::Invalid(format!("{key}: {value}"));
    match field {
        "type" => {
            config.key_type = Some(match value.to_ascii_lowercase().as_str() {
                "rsa" => KeyType::Rsa,
                "ecdsa" => KeyType::Ecdsa,
                _ => return Err(invalid()),
            });
        }
        "curve" => {
            config.curve = Some(match value.to_ascii_uppercase().as_str() {
                "P-256" => EcCurve::P256,
                "P-384" => EcCurve::P384,
                _ => return Err(invalid()),
            });
        }
        "keysize" => {
            config.key_size = Some(value.trim().parse().map_err(|_| invalid())?);
        }
        _ => tracing::warn!(key = %key, "unknown key parameter ignored"),
    }
    Ok(())
}

/// parameters_from_vars は prefix で始まる変数をパラメータに変換する。
/// `ACME_PARAM_ACCOUNTKEY__TYPE=ecdsa` は `ACCOUNTKEY/TYPE` になる。
pub fn parameters_from_vars<I>(prefix: &str, vars: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .filter_map(|(name, value)| {
            name.strip_prefix(prefix)
                .filter(|rest| !rest.is_empty())
                .map(|rest| (rest.replace("__", "/"), value))
        })
        .collect()
}

/// parameters_from_env はプロセス環境変数から parameters_from_vars を行う。
pub fn parameters_from_env(prefix: &str) -> Vec<(String, String)> {
    parameters_from_vars(prefix, std::env::vars())
}

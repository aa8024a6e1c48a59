use std::fmt::Display;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::prelude::*;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::Sha256;
use thiserror::Error;

use crate::config::ConnectionConfig;

type HmacSha256 = Hmac<Sha256>;

// RFC 3986 unreserved characters; everything else is percent-encoded.
const STRICT_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("shared access key is not valid base64: {0}")]
    InvalidKey(#[from] base64::DecodeError),
}

/// A shared access signature: a time-boxed credential minted fresh for every
/// request from the connection config, never cached or reused across calls.
///
/// Two scopes exist for one signing capability, selected by call site:
/// [SasToken::device] for event send/receive/feedback and [SasToken::service]
/// for device management. Rendered via [Display] into the `Authorization`
/// header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SasToken(String);

impl SasToken {
    /// Device-scoped token: signs `{host}/devices/{key_name}` and carries no
    /// policy name.
    pub fn device(config: &ConnectionConfig, expiry: u64) -> Result<Self, TokenError> {
        let resource = format!("{}/devices/{}", config.host, config.key_name);
        Self::sign(&resource, None, &config.key, expiry)
    }

    /// Service-scoped token: signs the bare host and names the shared access
    /// policy via `skn`.
    pub fn service(config: &ConnectionConfig, expiry: u64) -> Result<Self, TokenError> {
        Self::sign(&config.host, Some(&config.key_name), &config.key, expiry)
    }

    fn sign(
        resource: &str,
        policy: Option<&str>,
        key: &str,
        expiry: u64,
    ) -> Result<Self, TokenError> {
        let sr = utf8_percent_encode(resource, STRICT_ENCODE).to_string();
        let to_sign = format!("{sr}\n{expiry}");

        let key = BASE64_STANDARD.decode(key)?;
        let mut mac =
            HmacSha256::new_from_slice(&key).expect("HMAC accepts keys of any length");
        mac.update(to_sign.as_bytes());
        let signature = BASE64_STANDARD.encode(mac.finalize().into_bytes());
        let sig = utf8_percent_encode(&signature, STRICT_ENCODE);

        let mut token = format!("SharedAccessSignature sr={sr}&sig={sig}&se={expiry}");
        if let Some(policy) = policy {
            token.push_str("&skn=");
            token.push_str(policy);
        }

        Ok(Self(token))
    }
}

impl Display for SasToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Token lifetime used for every request: the next whole second at least an
/// hour away.
pub fn an_hour_from_now() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is set before the unix epoch");
    (now.as_secs_f64() + 3600.0).ceil() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    // base64("secret")
    const KEY: &str = "c2VjcmV0";

    fn test_config() -> ConnectionConfig {
        ConnectionConfig {
            host: "contoso.azure-devices.net".to_string(),
            hub_name: "contoso".to_string(),
            key_name: "dev1".to_string(),
            key: KEY.to_string(),
        }
    }

    #[test]
    fn it_signs_a_device_scoped_token() {
        let token = SasToken::device(&test_config(), 1_700_000_000).unwrap();
        assert_eq!(
            token.to_string(),
            "SharedAccessSignature sr=contoso.azure-devices.net%2Fdevices%2Fdev1\
             &sig=a1FBPdq1PWs%2B7qMgAjF38DK362inCDDCw3of1ywKmQc%3D&se=1700000000"
        );
    }

    #[test]
    fn it_signs_a_service_scoped_token_with_policy_name() {
        let mut config = test_config();
        config.key_name = "owner".to_string();
        let token = SasToken::service(&config, 1_700_000_000).unwrap();
        assert_eq!(
            token.to_string(),
            "SharedAccessSignature sr=contoso.azure-devices.net\
             &sig=Nq3B7oVLSlvSP6xQmtGuTBHna325Bq2hclSzw2ncHL4%3D&se=1700000000&skn=owner"
        );
    }

    #[test]
    fn it_rejects_a_key_that_is_not_base64() {
        let mut config = test_config();
        config.key = "not base64!".to_string();
        assert!(matches!(
            SasToken::device(&config, 1_700_000_000),
            Err(TokenError::InvalidKey(_))
        ));
    }

    #[test]
    fn expiry_is_at_least_an_hour_away() {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let expiry = an_hour_from_now();
        assert!(expiry >= now + 3600);
        assert!(expiry <= now + 3602);
    }
}

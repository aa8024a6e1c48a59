use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

use crate::util::http::{InvalidUriError, Uri};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} undefined")]
    Missing(&'static str),
}

/// Connection settings for a single hub. Supplied by the caller on every
/// operation; nothing here is cached or persisted by the client.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ConnectionConfig {
    /// Fully-qualified DNS hostname of the hub. A value carrying an explicit
    /// scheme (`http://…`) is used verbatim, which local endpoints rely on.
    pub host: String,

    /// Name of the hub, sent as the `iothub-name` header on device
    /// management operations.
    pub hub_name: String,

    /// Identifier of a registered device, or the name of a shared access
    /// policy for device management operations.
    pub key_name: String,

    /// Base64 shared access key associated with `key_name`.
    pub key: String,
}

impl ConnectionConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: require("HUBLINK_HOST")?,
            hub_name: require("HUBLINK_HUB_NAME")?,
            key_name: require("HUBLINK_KEY_NAME")?,
            key: require("HUBLINK_KEY")?,
        })
    }

    pub(crate) fn base_uri(&self) -> Result<Uri, InvalidUriError> {
        if self.host.contains("://") {
            Uri::from_string(self.host.clone())
        } else {
            Uri::from_string(format!("https://{}", self.host))
        }
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(host: &str) -> ConnectionConfig {
        ConnectionConfig {
            host: host.to_string(),
            hub_name: "contoso".to_string(),
            key_name: "dev1".to_string(),
            key: "c2VjcmV0".to_string(),
        }
    }

    #[test]
    fn it_defaults_to_https_for_bare_hostnames() {
        let uri = test_config("contoso.azure-devices.net").base_uri().unwrap();
        assert_eq!(uri.to_string(), "https://contoso.azure-devices.net/");
    }

    #[test]
    fn it_keeps_an_explicit_scheme() {
        let uri = test_config("http://127.0.0.1:9999").base_uri().unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:9999/");
    }
}

//! Client security settings shared by the producer and the consumer.

use rdkafka::config::ClientConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// TLS / SASL settings.
///
/// All fields are optional; an empty value leaves librdkafka's default
/// (`plaintext`, no SASL) in place.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaSecurity {
    /// `plaintext`, `ssl`, `sasl_plaintext` or `sasl_ssl`
    pub protocol: Option<String>,
    /// `PLAIN`, `SCRAM-SHA-256` or `SCRAM-SHA-512`
    pub sasl_mechanism: Option<String>,
    /// SASL username
    pub username: Option<String>,
    /// SASL password
    pub password: Option<String>,
    /// CA bundle for TLS
    pub ca_location: Option<String>,
}

impl KafkaSecurity {
    /// Write the configured settings into a client config.
    pub fn apply(&self, config: &mut ClientConfig) {
        let settings = [
            ("security.protocol", &self.protocol),
            ("sasl.mechanism", &self.sasl_mechanism),
            ("sasl.username", &self.username),
            ("sasl.password", &self.password),
            ("ssl.ca.location", &self.ca_location),
        ];
        for (key, value) in settings {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                config.set(key, value);
            }
        }
    }
}

impl fmt::Debug for KafkaSecurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KafkaSecurity")
            .field("protocol", &self.protocol)
            .field("sasl_mechanism", &self.sasl_mechanism)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("ca_location", &self.ca_location)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code
mod tests {
    use super::*;

    #[test]
    fn test_only_set_fields_are_applied() {
        let security = KafkaSecurity {
            protocol: Some("sasl_ssl".into()),
            username: Some("svc".into()),
            password: Some(String::new()),
            ..KafkaSecurity::default()
        };
        let mut config = ClientConfig::new();
        security.apply(&mut config);

        assert_eq!(config.get("security.protocol"), Some("sasl_ssl"));
        assert_eq!(config.get("sasl.username"), Some("svc"));
        assert_eq!(config.get("sasl.password"), None);
        assert_eq!(config.get("sasl.mechanism"), None);
    }

    #[test]
    fn test_debug_hides_password() {
        let security = KafkaSecurity {
            password: Some("hunter2".into()),
            ..KafkaSecurity::default()
        };
        assert!(!format!("{security:?}").contains("hunter2"));
    }
}

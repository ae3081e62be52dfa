// TLS settings
// Resolves the credential configuration of a client into one of four modes

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// How a client secures its connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsMode {
    Plain,
    TlsSkipVerify,
    TlsWithCa,
    MutualTls,
}

impl fmt::Display for TlsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TlsMode::Plain => write!(f, "plain"),
            TlsMode::TlsSkipVerify => write!(f, "tls-skip-verify"),
            TlsMode::TlsWithCa => write!(f, "tls-with-ca"),
            TlsMode::MutualTls => write!(f, "mutual-tls"),
        }
    }
}

/// TLS credentials as PEM text
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TlsSettings {
    pub enabled: bool,
    pub skip_verify: bool,
    pub mutual: bool,
    pub server_ca: Option<String>,
    pub client_cert: Option<String>,
    pub client_key: Option<String>,
}

impl TlsSettings {
    pub fn plain() -> Self {
        Self::default()
    }

    /// TLS without verifying the server certificate
    pub fn insecure() -> Self {
        Self {
            enabled: true,
            skip_verify: true,
            ..Self::default()
        }
    }

    /// TLS verified against a server CA
    pub fn with_server_ca(server_ca: impl Into<String>) -> Self {
        Self {
            enabled: true,
            server_ca: Some(server_ca.into()),
            ..Self::default()
        }
    }

    /// Mutual TLS with a client identity
    pub fn mutual(
        server_ca: impl Into<String>,
        client_cert: impl Into<String>,
        client_key: impl Into<String>,
    ) -> Self {
        Self {
            enabled: true,
            skip_verify: false,
            mutual: true,
            server_ca: Some(server_ca.into()),
            client_cert: Some(client_cert.into()),
            client_key: Some(client_key.into()),
        }
    }

    /// Check the settings and resolve the mode
    ///
    /// Mutual TLS needs a client certificate, a client key and a server CA.
    /// Otherwise TLS with skip-verify needs nothing more, and plain TLS needs
    /// a server CA.
    pub fn validate(&self) -> Result<TlsMode, ConfigError> {
        if self.mutual {
            if is_blank(&self.client_cert) || is_blank(&self.client_key) {
                return Err(ConfigError::MissingClientIdentity);
            }
            if is_blank(&self.server_ca) {
                return Err(ConfigError::MissingMutualServerCa);
            }
            return Ok(TlsMode::MutualTls);
        }

        if self.enabled {
            if self.skip_verify {
                return Ok(TlsMode::TlsSkipVerify);
            }
            if is_blank(&self.server_ca) {
                return Err(ConfigError::MissingServerCa);
            }
            return Ok(TlsMode::TlsWithCa);
        }

        Ok(TlsMode::Plain)
    }

    /// The mode these settings describe, without checking credentials
    pub fn mode(&self) -> TlsMode {
        if self.mutual {
            TlsMode::MutualTls
        } else if self.enabled && self.skip_verify {
            TlsMode::TlsSkipVerify
        } else if self.enabled {
            TlsMode::TlsWithCa
        } else {
            TlsMode::Plain
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

impl fmt::Debug for TlsSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsSettings")
            .field("enabled", &self.enabled)
            .field("skip_verify", &self.skip_verify)
            .field("mutual", &self.mutual)
            .field("server_ca", &self.server_ca.is_some())
            .field("client_cert", &self.client_cert.is_some())
            .field("client_key", &self.client_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain() {
        assert_eq!(TlsSettings::plain().validate().unwrap(), TlsMode::Plain);
    }

    #[test]
    fn test_skip_verify_needs_no_ca() {
        assert_eq!(TlsSettings::insecure().validate().unwrap(), TlsMode::TlsSkipVerify);
    }

    #[test]
    fn test_tls_requires_ca() {
        let settings = TlsSettings {
            enabled: true,
            ..TlsSettings::default()
        };
        assert!(matches!(settings.validate(), Err(ConfigError::MissingServerCa)));
        assert_eq!(TlsSettings::with_server_ca("CA").validate().unwrap(), TlsMode::TlsWithCa);
    }

    #[test]
    fn test_mutual_requires_identity_and_ca() {
        let mut settings = TlsSettings::mutual("CA", "CERT", "KEY");
        assert_eq!(settings.validate().unwrap(), TlsMode::MutualTls);

        settings.client_key = None;
        assert!(matches!(settings.validate(), Err(ConfigError::MissingClientIdentity)));

        let mut settings = TlsSettings::mutual("", "CERT", "KEY");
        assert!(matches!(settings.validate(), Err(ConfigError::MissingMutualServerCa)));

        // skip-verify does not relax mutual TLS
        settings.skip_verify = true;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let rendered = format!("{:?}", TlsSettings::mutual("CA", "CERT", "secret-key"));
        assert!(!rendered.contains("secret-key"));
    }
}

// Client configuration
// Serde/TOML configuration for building clients

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tls::TlsSettings;

/// Errors raised while configuring a client
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("client address is empty")]
    EmptyAddress,

    #[error("a server CA is required when TLS is enabled without skip-verify")]
    MissingServerCa,

    #[error("a client certificate and key are required for mutual TLS")]
    MissingClientIdentity,

    #[error("a server CA is required for mutual TLS")]
    MissingMutualServerCa,

    #[error("interceptor {0} is already registered")]
    DuplicateInterceptor(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// TLS section of the client configuration
///
/// PEM material may be inline or read from a file; inline wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub enabled: bool,
    pub skip_verify: bool,
    pub mutual: bool,
    pub server_ca: Option<String>,
    pub server_ca_file: Option<PathBuf>,
    pub client_cert: Option<String>,
    pub client_cert_file: Option<PathBuf>,
    pub client_key: Option<String>,
    pub client_key_file: Option<PathBuf>,
}

impl TlsConfig {
    /// Resolve inline and file PEM material into settings
    pub fn settings(&self) -> Result<TlsSettings, ConfigError> {
        Ok(TlsSettings {
            enabled: self.enabled || self.mutual,
            skip_verify: self.skip_verify,
            mutual: self.mutual,
            server_ca: pem(&self.server_ca, &self.server_ca_file)?,
            client_cert: pem(&self.client_cert, &self.client_cert_file)?,
            client_key: pem(&self.client_key, &self.client_key_file)?,
        })
    }
}

fn pem(inline: &Option<String>, file: &Option<PathBuf>) -> Result<Option<String>, ConfigError> {
    if let Some(inline) = inline {
        return Ok(Some(inline.clone()));
    }
    match file {
        Some(path) => fs::read_to_string(path)
            .map(Some)
            .map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            }),
        None => Ok(None),
    }
}

/// Configuration of one client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base address, e.g. `https://orders.internal:8443`
    pub address: String,

    /// Client-wide timeout in milliseconds; zero disables it
    pub timeout_ms: u64,

    pub tls: TlsConfig,

    /// Interceptor names, outermost first
    pub interceptors: Vec<String>,
}

impl ClientConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_interceptors<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interceptors = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert!(config.address.is_empty());
        assert_eq!(config.timeout(), None);
        assert!(config.interceptors.is_empty());
        assert!(!config.tls.enabled);
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::new("http://orders")
            .with_timeout_ms(1500)
            .with_interceptors(["logging", "callstatus"]);
        assert_eq!(config.timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.interceptors, vec!["logging", "callstatus"]);
    }

    #[test]
    fn test_parse_toml() {
        let config = ClientConfig::from_toml_str(
            r#"
            address = "https://orders.internal"
            timeout_ms = 2000
            interceptors = ["requestid", "logging"]

            [tls]
            enabled = true
            skip_verify = true
            "#,
        )
        .unwrap();

        assert_eq!(config.address, "https://orders.internal");
        assert_eq!(config.interceptors, vec!["requestid", "logging"]);
        assert!(config.tls.skip_verify);
        assert_eq!(
            config.tls.settings().unwrap().validate().unwrap(),
            crate::tls::TlsMode::TlsSkipVerify
        );
    }

    #[test]
    fn test_parse_error() {
        let err = ClientConfig::from_toml_str("timeout_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_with_pem_files() {
        let dir = tempfile::tempdir().unwrap();
        let ca_path = dir.path().join("ca.pem");
        fs::write(&ca_path, "CA PEM").unwrap();

        let config_path = dir.path().join("client.toml");
        let mut file = fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            "address = \"https://billing\"\n[tls]\nenabled = true\nserver_ca_file = {:?}",
            ca_path.to_string_lossy()
        )
        .unwrap();

        let config = ClientConfig::load(&config_path).unwrap();
        let settings = config.tls.settings().unwrap();
        assert_eq!(settings.server_ca.as_deref(), Some("CA PEM"));
        assert_eq!(settings.validate().unwrap(), crate::tls::TlsMode::TlsWithCa);
    }

    #[test]
    fn test_missing_pem_file() {
        let tls = TlsConfig {
            enabled: true,
            server_ca_file: Some(PathBuf::from("/definitely/not/here.pem")),
            ..TlsConfig::default()
        };
        assert!(matches!(tls.settings(), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            ClientConfig::load("/definitely/not/here.toml"),
            Err(ConfigError::Io { .. })
        ));
    }
}

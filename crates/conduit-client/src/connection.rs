// Connection management
// Lazily dials one transport per client and hands it to every call

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use conduit_error::{codes, CoderRegistry, StackError};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::options::Headers;
use crate::tls::TlsSettings;

/// A request ready for the wire
#[derive(Debug, Clone, Default)]
pub struct TransportRequest {
    pub method: String,
    pub url: String,
    pub headers: Headers,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
}

/// What came back from the wire
#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Headers,
    /// Raw `Set-Cookie` values
    pub cookies: Vec<String>,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
            ..Self::default()
        }
    }

    /// A response carrying a JSON body
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        let mut response = Self::new(status, value.to_string());
        response.headers.insert("content-type", "application/json");
        response
    }
}

/// Transport level failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("tls setup failed: {0}")]
    Tls(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request cancelled: {0}")]
    Cancelled(String),
}

/// A connected transport
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// Builds transports for an address and TLS configuration
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        address: &str,
        tls: &TlsSettings,
    ) -> Result<Arc<dyn Transport>, TransportError>;
}

/// Caches the transport of one client
///
/// The first call dials; concurrent first calls wait on the write lock and
/// reuse whatever the winner stored.
pub struct ConnectionManager {
    address: String,
    tls: TlsSettings,
    connector: Arc<dyn Connector>,
    codes: Arc<CoderRegistry>,
    cached: RwLock<Option<Arc<dyn Transport>>>,
}

impl ConnectionManager {
    pub fn new(
        address: impl Into<String>,
        tls: TlsSettings,
        connector: Arc<dyn Connector>,
        codes: Arc<CoderRegistry>,
    ) -> Self {
        Self {
            address: address.into(),
            tls,
            connector,
            codes,
            cached: RwLock::new(None),
        }
    }

    /// The cached transport, dialing it on first use
    pub async fn get(&self) -> Result<Arc<dyn Transport>, StackError> {
        if let Some(transport) = self.cached.read().await.as_ref() {
            debug!(address = %self.address, "connection exists, reuse it");
            return Ok(transport.clone());
        }

        let mut slot = self.cached.write().await;
        if let Some(transport) = slot.as_ref() {
            return Ok(transport.clone());
        }

        debug!(address = %self.address, mode = %self.tls.mode(), "dialing");
        let transport = self
            .connector
            .connect(&self.address, &self.tls)
            .await
            .map_err(|e| {
                tracing::error!(address = %self.address, error = %e, "dial failed");
                StackError::wrap_error(&self.codes, codes::CLIENT_GENERATE, e)
            })?;

        *slot = Some(transport.clone());
        Ok(transport)
    }

    /// Drop the cached transport; the next call dials again
    pub async fn close(&self) {
        if self.cached.write().await.take().is_some() {
            debug!(address = %self.address, "connection released");
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.cached.read().await.is_some()
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn tls(&self) -> &TlsSettings {
        &self.tls
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("address", &self.address)
            .field("tls", &self.tls)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockConnector;
    use conduit_error::ModuleInfo;

    fn manager(connector: Arc<MockConnector>) -> ConnectionManager {
        ConnectionManager::new(
            "http://mock",
            TlsSettings::plain(),
            connector,
            Arc::new(CoderRegistry::new(ModuleInfo::new("conn"))),
        )
    }

    #[tokio::test]
    async fn test_reuses_connection() {
        let connector = Arc::new(MockConnector::ok());
        let manager = manager(connector.clone());

        manager.get().await.unwrap();
        manager.get().await.unwrap();
        assert_eq!(connector.dials(), 1);
        assert!(manager.is_connected().await);
    }

    #[tokio::test]
    async fn test_close_forces_redial() {
        let connector = Arc::new(MockConnector::ok());
        let manager = manager(connector.clone());

        manager.get().await.unwrap();
        manager.close().await;
        assert!(!manager.is_connected().await);
        manager.get().await.unwrap();
        assert_eq!(connector.dials(), 2);
    }

    #[tokio::test]
    async fn test_dial_failure_is_coded() {
        let connector = Arc::new(MockConnector::failing("refused"));
        let manager = manager(connector);

        let err = manager.get().await.err().unwrap();
        assert_eq!(err.code(), codes::CLIENT_GENERATE);
        assert_eq!(err.description(), "connect failed: refused");
        assert_eq!(err.stack().len(), 1);
        assert!(!manager.is_connected().await);
    }
}

// Mock transport
// In-memory connector for tests and local development

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use crate::connection::{Connector, Transport, TransportError, TransportRequest, TransportResponse};
use crate::tls::TlsSettings;

/// Produces the response for a recorded request
pub type MockHandler =
    Arc<dyn Fn(&TransportRequest) -> Result<TransportResponse, TransportError> + Send + Sync>;

/// A connector whose transports answer from a handler
pub struct MockConnector {
    handler: MockHandler,
    failure: Option<String>,
    connect_delay: Option<Duration>,
    send_delay: Option<Duration>,
    dials: AtomicUsize,
    requests: Arc<Mutex<Vec<TransportRequest>>>,
}

impl MockConnector {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&TransportRequest) -> Result<TransportResponse, TransportError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            handler: Arc::new(handler),
            failure: None,
            connect_delay: None,
            send_delay: None,
            dials: AtomicUsize::new(0),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answers every request with 200 and a success call status
    pub fn ok() -> Self {
        Self::new(|_| Ok(TransportResponse::json(200, &success_body())))
    }

    /// Every dial fails with `reason`
    pub fn failing(reason: impl Into<String>) -> Self {
        let mut connector = Self::ok();
        connector.failure = Some(reason.into());
        connector
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = Some(delay);
        self
    }

    /// How many times `connect` ran
    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    /// Requests sent through any transport of this connector
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().clone()
    }
}

impl fmt::Debug for MockConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockConnector")
            .field("failure", &self.failure)
            .field("dials", &self.dials())
            .finish_non_exhaustive()
    }
}

/// A JSON reply body carrying a success call status
pub fn success_body() -> serde_json::Value {
    json!({
        "callStatus": {
            "code": conduit_error::codes::SUCCESS,
            "message": {},
            "stack": [],
            "description": ""
        },
        "data": null
    })
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        _address: &str,
        _tls: &TlsSettings,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = &self.failure {
            return Err(TransportError::Connect(reason.clone()));
        }

        Ok(Arc::new(MockTransport {
            handler: self.handler.clone(),
            send_delay: self.send_delay,
            requests: self.requests.clone(),
        }))
    }
}

struct MockTransport {
    handler: MockHandler,
    send_delay: Option<Duration>,
    requests: Arc<Mutex<Vec<TransportRequest>>>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.requests.lock().push(request.clone());
        if let Some(delay) = self.send_delay {
            tokio::time::sleep(delay).await;
        }
        (self.handler)(&request)
    }
}

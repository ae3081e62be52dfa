// HTTP transport
// reqwest-backed connector and transport

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::SET_COOKIE;
use reqwest::{Certificate, Identity, Method, Proxy};
use tracing::debug;

use crate::connection::{Connector, Transport, TransportError, TransportRequest, TransportResponse};
use crate::options::Headers;
use crate::tls::{TlsMode, TlsSettings};

/// Dials a `reqwest::Client` configured for the client's TLS mode
#[derive(Debug, Clone, Default)]
pub struct HttpConnector {
    proxy: Option<String>,
    user_agent: Option<String>,
}

impl HttpConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route every request through a proxy
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    fn build_client(&self, tls: &TlsSettings) -> Result<reqwest::Client, TransportError> {
        let mut builder = reqwest::Client::builder();

        match tls.mode() {
            TlsMode::Plain => {}
            TlsMode::TlsSkipVerify => {
                builder = builder.danger_accept_invalid_certs(true);
            }
            TlsMode::TlsWithCa => {
                builder = builder.add_root_certificate(server_ca(tls)?);
            }
            TlsMode::MutualTls => {
                let mut pem = tls.client_cert.clone().unwrap_or_default().into_bytes();
                pem.push(b'\n');
                pem.extend_from_slice(tls.client_key.as_deref().unwrap_or_default().as_bytes());
                let identity =
                    Identity::from_pem(&pem).map_err(|e| TransportError::Tls(e.to_string()))?;

                builder = builder.add_root_certificate(server_ca(tls)?).identity(identity);
            }
        }

        if let Some(proxy) = &self.proxy {
            let proxy = Proxy::all(proxy).map_err(|e| TransportError::Connect(e.to_string()))?;
            builder = builder.proxy(proxy);
        }
        if let Some(user_agent) = &self.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        builder.build().map_err(|e| TransportError::Connect(e.to_string()))
    }
}

fn server_ca(tls: &TlsSettings) -> Result<Certificate, TransportError> {
    let pem = tls.server_ca.as_deref().unwrap_or_default();
    Certificate::from_pem(pem.as_bytes()).map_err(|e| TransportError::Tls(e.to_string()))
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(
        &self,
        address: &str,
        tls: &TlsSettings,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        debug!(address, mode = %tls.mode(), "building http client");
        let client = self.build_client(tls)?;
        Ok(Arc::new(HttpTransport { client }))
    }
}

/// Sends requests through a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let mut builder = self.client.request(method, &request.url);
        for (key, value) in request.headers.pairs() {
            builder = builder.header(key, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(request.timeout.unwrap_or_default())
            } else if e.is_connect() {
                TransportError::Connect(e.to_string())
            } else {
                TransportError::Send(e.to_string())
            }
        })?;

        let status = response.status();
        let mut headers = Headers::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.add(name.as_str(), value);
            }
        }
        let cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;

        Ok(TransportResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            cookies,
            body,
        })
    }
}

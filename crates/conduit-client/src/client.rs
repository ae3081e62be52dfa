// Client
// Holds the immutable call defaults and drives invocations through the chain

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use conduit_error::{codes, CoderRegistry, StackError};
use serde::Serialize;
use tracing::{debug, error};

use crate::chain::{Interceptor, Invocation, InvokeError, InvokeResult, Next, TransportInvoker};
use crate::config::{ClientConfig, ConfigError};
use crate::connection::{ConnectionManager, Connector, Transport};
use crate::context::CallContext;
use crate::http::HttpConnector;
use crate::options::{combine, CallInfo, CallOption};
use crate::registry::InterceptorRegistry;
use crate::reply::{Reply, RequestBody};
use crate::skipper::Skipper;
use crate::tls::{TlsMode, TlsSettings};

/// Everything a client fixes at construction
pub struct ClientState {
    address: String,
    timeout: Option<Duration>,
    tls: TlsSettings,
    mode: TlsMode,
    codes: Arc<CoderRegistry>,
    default_options: Vec<CallOption>,
    interceptor_names: Vec<String>,
    skippers: Vec<Skipper>,
    interceptors: Arc<InterceptorRegistry>,
    chain: Vec<Arc<dyn Interceptor>>,
    connection: ConnectionManager,
}

impl ClientState {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn tls(&self) -> &TlsSettings {
        &self.tls
    }

    pub fn tls_mode(&self) -> TlsMode {
        self.mode
    }

    pub fn codes(&self) -> &CoderRegistry {
        &self.codes
    }

    pub fn default_options(&self) -> &[CallOption] {
        &self.default_options
    }

    pub fn interceptor_names(&self) -> &[String] {
        &self.interceptor_names
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }
}

impl fmt::Debug for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientState")
            .field("address", &self.address)
            .field("timeout", &self.timeout)
            .field("mode", &self.mode)
            .field("default_options", &self.default_options)
            .field("interceptors", &self.interceptor_names)
            .finish_non_exhaustive()
    }
}

/// A client for one remote service
///
/// Cheap to clone; clones share defaults and the cached connection.
#[derive(Clone, Debug)]
pub struct Client {
    state: Arc<ClientState>,
}

impl Client {
    pub fn builder(address: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(address)
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    pub fn address(&self) -> &str {
        &self.state.address
    }

    pub fn codes(&self) -> &Arc<CoderRegistry> {
        &self.state.codes
    }

    /// Run one call through the interceptor chain
    ///
    /// Options apply on top of the client defaults. An `Interceptors` option
    /// replaces the client's chain for this call only.
    pub async fn invoke(
        &self,
        ctx: &CallContext,
        method: &str,
        target: &str,
        request: &RequestBody,
        reply: Option<&mut dyn Reply>,
        options: Vec<CallOption>,
    ) -> InvokeResult {
        let state = self.state.as_ref();
        let options = combine(&state.default_options, options);

        let chain = match CallInfo::from_options(&options).interceptors {
            Some(names) => {
                debug!(interceptors = ?names, "call overrides interceptor chain");
                Cow::Owned(state.interceptors.resolve(&names, &state.skippers))
            }
            None => Cow::Borrowed(state.chain.as_slice()),
        };

        let mut invocation = Invocation {
            method: method.to_string(),
            target: target.to_string(),
            request,
            // Reborrow; the reply may live shorter than the client
            reply: match reply {
                Some(reply) => Some(reply),
                None => None,
            },
            options,
            client: state,
        };

        let result = Next::new(&chain, &TransportInvoker)
            .run(ctx, &mut invocation)
            .await;

        match &result {
            Ok(response) => debug!(
                method,
                path = target,
                status = response.status_code,
                "invoke finished"
            ),
            Err(err) => debug!(method, path = target, error = %err, "invoke failed"),
        }
        result
    }

    /// Serialize `request` as JSON and decode the reply into `R`
    pub async fn invoke_json<Req, R>(
        &self,
        ctx: &CallContext,
        method: &str,
        target: &str,
        request: &Req,
        options: Vec<CallOption>,
    ) -> Result<R, InvokeError>
    where
        Req: Serialize + ?Sized,
        R: Reply + Default,
    {
        let body = RequestBody::json(request).map_err(|e| {
            error!(error = %e, "marshal request failed");
            InvokeError::new(StackError::wrap_error(&self.state.codes, codes::ENCODING_JSON, e))
        })?;

        let mut reply = R::default();
        self.invoke(ctx, method, target, &body, Some(&mut reply), options)
            .await?;
        Ok(reply)
    }

    /// Run `handler` against the cached transport
    ///
    /// The client timeout and the context deadline bound the handler.
    pub async fn call<F, Fut, T>(&self, ctx: &CallContext, handler: F) -> Result<T, StackError>
    where
        F: FnOnce(Arc<dyn Transport>) -> Fut,
        Fut: Future<Output = Result<T, StackError>>,
    {
        let registry = self.state.codes.as_ref();

        let limit = match (self.state.timeout, ctx.remaining()) {
            (Some(t), Some(r)) => Some(t.min(r)),
            (t, r) => t.or(r),
        };
        let work = async {
            let transport = match self.state.connection.get().await {
                Ok(transport) => transport,
                Err(e) => return Err(e),
            };
            match limit {
                Some(limit) => tokio::time::timeout(limit, handler(transport))
                    .await
                    .unwrap_or_else(|_| {
                        Err(StackError::wrap(
                            registry,
                            codes::RPC_INVOKE,
                            format!("call timed out after {:?}", limit),
                        ))
                    }),
                None => handler(transport).await,
            }
        };

        let result = tokio::select! {
            biased;
            _ = ctx.done() => Err(StackError::wrap(
                registry,
                codes::RPC_INVOKE,
                ctx.done_reason().unwrap_or("context cancelled"),
            )),
            result = work => result,
        };

        result.map_err(|e| {
            error!(code = e.code(), error = %e, "call failed");
            StackError::update_stack(registry, e)
        })
    }

    /// Release the cached connection; later calls dial again
    pub async fn close(&self) {
        self.state.connection.close().await;
    }
}

/// Builder mirroring the client options
pub struct ClientBuilder {
    address: String,
    timeout: Option<Duration>,
    tls: TlsSettings,
    codes: Option<Arc<CoderRegistry>>,
    options: Vec<CallOption>,
    interceptor_names: Vec<String>,
    skippers: Vec<Skipper>,
    interceptors: Option<Arc<InterceptorRegistry>>,
    connector: Option<Arc<dyn Connector>>,
}

impl ClientBuilder {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            timeout: None,
            tls: TlsSettings::plain(),
            codes: None,
            options: Vec::new(),
            interceptor_names: Vec::new(),
            skippers: Vec::new(),
            interceptors: None,
            connector: None,
        }
    }

    /// Start from a loaded configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        let mut builder = Self::new(config.address.clone())
            .with_tls(config.tls.settings()?)
            .with_interceptors(config.interceptors.iter().cloned());
        builder.timeout = config.timeout();
        Ok(builder)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_tls(mut self, tls: TlsSettings) -> Self {
        self.tls = tls;
        self
    }

    /// TLS without server verification
    pub fn with_insecure(mut self) -> Self {
        self.tls.enabled = true;
        self.tls.skip_verify = true;
        self
    }

    pub fn with_server_ca(mut self, server_ca: impl Into<String>) -> Self {
        self.tls.enabled = true;
        self.tls.server_ca = Some(server_ca.into());
        self
    }

    pub fn with_mtls(
        mut self,
        server_ca: impl Into<String>,
        client_cert: impl Into<String>,
        client_key: impl Into<String>,
    ) -> Self {
        self.tls = TlsSettings::mutual(server_ca, client_cert, client_key);
        self
    }

    /// Default options applied before every call's own options
    pub fn with_call_options(mut self, options: impl IntoIterator<Item = CallOption>) -> Self {
        self.options = options.into_iter().collect();
        self
    }

    /// Interceptor names, outermost first
    pub fn with_interceptors<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interceptor_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_skippers(mut self, skippers: impl IntoIterator<Item = Skipper>) -> Self {
        self.skippers = skippers.into_iter().collect();
        self
    }

    pub fn with_interceptor_registry(mut self, registry: Arc<InterceptorRegistry>) -> Self {
        self.interceptors = Some(registry);
        self
    }

    pub fn with_codes(mut self, codes: Arc<CoderRegistry>) -> Self {
        self.codes = Some(codes);
        self
    }

    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Validate and build; no I/O happens here
    #[track_caller]
    pub fn build(self) -> Result<Client, StackError> {
        let registry = self
            .codes
            .unwrap_or_else(|| Arc::new(CoderRegistry::default()));

        if self.address.trim().is_empty() {
            return Err(StackError::wrap_error(
                &registry,
                codes::CLIENT_GENERATE,
                ConfigError::EmptyAddress,
            ));
        }
        let mode = match self.tls.validate() {
            Ok(mode) => mode,
            Err(e) => {
                error!(address = %self.address, error = %e, "invalid tls configuration");
                return Err(StackError::wrap_error(&registry, codes::CLIENT_GENERATE, e));
            }
        };

        let interceptors = self
            .interceptors
            .unwrap_or_else(|| Arc::new(InterceptorRegistry::with_defaults()));
        let chain = interceptors.resolve(&self.interceptor_names, &self.skippers);
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(HttpConnector::new()) as Arc<dyn Connector>);
        let connection = ConnectionManager::new(
            self.address.clone(),
            self.tls.clone(),
            connector,
            registry.clone(),
        );

        debug!(
            address = %self.address,
            %mode,
            interceptors = ?self.interceptor_names,
            "client created"
        );

        Ok(Client {
            state: Arc::new(ClientState {
                address: self.address,
                timeout: self.timeout,
                tls: self.tls,
                mode,
                codes: registry,
                default_options: self.options,
                interceptor_names: self.interceptor_names,
                skippers: self.skippers,
                interceptors,
                chain,
                connection,
            }),
        })
    }
}

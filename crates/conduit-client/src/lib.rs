//! Conduit client invocation core
//!
//! A [`Client`] sends calls through an ordered chain of named interceptors
//! around a lazily dialed transport. Errors come back as
//! [`StackError`](conduit_error::StackError)s whose history spans every
//! service the call passed through.

pub mod chain;
pub mod client;
pub mod config;
pub mod connection;
pub mod context;
pub mod http;
pub mod interceptors;
pub mod mock;
pub mod options;
pub mod registry;
pub mod reply;
pub mod request;
pub mod skipper;
pub mod telemetry;
pub mod tls;

pub use chain::{
    Interceptor, Invocation, InvokeError, InvokeResult, Invoker, Next, RawResponse,
    TransportInvoker,
};
pub use client::{Client, ClientBuilder, ClientState};
pub use config::{ClientConfig, ConfigError, TlsConfig};
pub use connection::{
    ConnectionManager, Connector, Transport, TransportError, TransportRequest, TransportResponse,
};
pub use context::CallContext;
pub use http::{HttpConnector, HttpTransport};
pub use options::{combine, CallInfo, CallOption, CallOptions, Headers, Query};
pub use registry::{InterceptorFactory, InterceptorRegistry};
pub use reply::{Envelope, Reply, RequestBody};
pub use request::Request;
pub use skipper::Skipper;
pub use telemetry::TelemetryConfig;
pub use tls::{TlsMode, TlsSettings};

pub use conduit_callstatus::{CallStatus, CallStatusField, HasCallStatus};
pub use conduit_error::{codes, Coder, CoderRegistry, ModuleInfo, StackError};

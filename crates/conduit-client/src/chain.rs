// Interceptor chain
// Runs interceptors around the transport call in onion order

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use conduit_error::{codes, CallSite, CoderRegistry, StackError};
use thiserror::Error;
use tracing::{debug, error};

use crate::client::ClientState;
use crate::connection::{Transport, TransportError, TransportRequest, TransportResponse};
use crate::context::CallContext;
use crate::options::{CallInfo, CallOption, Headers, Query};
use crate::reply::{Reply, RequestBody};

/// Transport-level view of a completed call, captured before decoding
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status_code: u16,
    pub status: String,
    pub headers: Headers,
    pub body: Bytes,
    pub cookies: Vec<String>,
    /// The URL that was actually requested
    pub request_url: String,
    /// Base address the request went to
    pub request_addr: String,
    pub request_headers: Headers,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// A failed call: the coded error plus the response, when one arrived
#[derive(Debug, Error)]
#[error("{error}")]
pub struct InvokeError {
    pub error: StackError,
    pub response: Option<RawResponse>,
}

impl InvokeError {
    pub fn new(error: StackError) -> Self {
        Self {
            error,
            response: None,
        }
    }

    pub fn with_response(error: StackError, response: RawResponse) -> Self {
        Self {
            error,
            response: Some(response),
        }
    }

    pub fn code(&self) -> i64 {
        self.error.code()
    }

    /// Append a frame for the caller, keeping code and response
    #[track_caller]
    pub fn update_stack(mut self, registry: &CoderRegistry) -> Self {
        self.error.push_frame_at(registry, CallSite::caller());
        self
    }

    pub fn into_error(self) -> StackError {
        self.error
    }
}

impl From<StackError> for InvokeError {
    fn from(error: StackError) -> Self {
        Self::new(error)
    }
}

pub type InvokeResult = Result<RawResponse, InvokeError>;

/// Everything one call carries through the chain
pub struct Invocation<'a> {
    pub method: String,
    pub target: String,
    pub request: &'a RequestBody,
    pub reply: Option<&'a mut dyn Reply>,
    /// Client defaults followed by call options; stages may push more
    pub options: Vec<CallOption>,
    pub client: &'a ClientState,
}

impl<'a> Invocation<'a> {
    pub fn codes(&self) -> &'a CoderRegistry {
        self.client.codes()
    }

    /// The options merged so far
    pub fn call_info(&self) -> CallInfo {
        CallInfo::from_options(&self.options)
    }
}

impl fmt::Debug for Invocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("method", &self.method)
            .field("target", &self.target)
            .field("request", &self.request)
            .field("reply", &self.reply)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// One stage of the chain
#[async_trait]
pub trait Interceptor: Send + Sync {
    fn name(&self) -> &str;

    /// When true for a call, the stage is bypassed entirely
    fn should_skip(&self, _method: &str, _target: &str) -> bool {
        false
    }

    /// Pre-call logic, then `next.run(..)`, then post-call logic
    async fn intercept(
        &self,
        ctx: &CallContext,
        invocation: &mut Invocation<'_>,
        next: Next<'_>,
    ) -> InvokeResult;
}

/// The call at the center of the chain
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(&self, ctx: &CallContext, invocation: &mut Invocation<'_>) -> InvokeResult;
}

/// The rest of the chain from `index` on
#[derive(Clone, Copy)]
pub struct Next<'a> {
    chain: &'a [Arc<dyn Interceptor>],
    index: usize,
    invoker: &'a dyn Invoker,
}

impl<'a> Next<'a> {
    /// The whole chain in front of `invoker`
    pub fn new(chain: &'a [Arc<dyn Interceptor>], invoker: &'a dyn Invoker) -> Self {
        Self {
            chain,
            index: 0,
            invoker,
        }
    }

    /// Run the next stage that does not skip this call, or the invoker
    pub async fn run(self, ctx: &CallContext, invocation: &mut Invocation<'_>) -> InvokeResult {
        let mut index = self.index;
        while let Some(interceptor) = self.chain.get(index) {
            if interceptor.should_skip(&invocation.method, &invocation.target) {
                debug!(
                    interceptor = interceptor.name(),
                    path = %invocation.target,
                    "skip interceptor"
                );
                index += 1;
                continue;
            }

            let next = Next {
                chain: self.chain,
                index: index + 1,
                invoker: self.invoker,
            };
            return interceptor.intercept(ctx, invocation, next).await;
        }

        self.invoker.invoke(ctx, invocation).await
    }

    /// Stages left before the invoker, skipped ones included
    pub fn remaining(&self) -> usize {
        self.chain.len().saturating_sub(self.index)
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.chain[self.index.min(self.chain.len())..]
            .iter()
            .map(|i| i.name())
            .collect();
        f.debug_struct("Next").field("remaining", &names).finish()
    }
}

/// Sends the call through the client's cached transport
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportInvoker;

#[async_trait]
impl Invoker for TransportInvoker {
    async fn invoke(&self, ctx: &CallContext, invocation: &mut Invocation<'_>) -> InvokeResult {
        let client = invocation.client;
        let registry = client.codes();
        let info = invocation.call_info();
        debug!(
            method = %invocation.method,
            path = %invocation.target,
            request = ?invocation.request,
            "invoke call"
        );

        let request_addr = info
            .endpoint
            .clone()
            .unwrap_or_else(|| client.address().to_string());
        let mut url = format!("{}{}", request_addr, invocation.target);
        if let Some(resolver) = &info.url {
            let resolved = resolver().map_err(|e| {
                error!(error = %e, "url resolver failed");
                InvokeError::new(StackError::update_stack(registry, e))
            })?;
            debug!(from = %url, to = %resolved, "url resolver changed request url");
            url = resolved;
        }
        let url = with_query(&url, &info.query).map_err(|e| {
            error!(url = %url, error = %e, "invalid request url");
            InvokeError::new(StackError::wrap(registry, codes::HTTP_ERROR, e))
        })?;

        let timeout = effective_timeout(info.timeout.or(client.timeout()), ctx.remaining());
        if let Some(timeout) = timeout {
            debug!(?timeout, "request set timeout");
        }

        let body = invocation.request.to_bytes().map_err(|e| {
            error!(error = %e, "marshal request body failed");
            InvokeError::new(StackError::wrap_error(registry, codes::ENCODING_JSON, e))
        })?;

        let mut headers = info.headers.clone();
        if body.is_some() && !headers.contains("content-type") {
            headers.insert("content-type", "application/json");
        }

        let mut request = TransportRequest {
            method: invocation.method.clone(),
            url: url.clone(),
            headers,
            body,
            timeout,
        };
        if let Some(process) = &info.process {
            process(&mut request)
                .map_err(|e| InvokeError::new(StackError::update_stack(registry, e)))?;
        }
        let request_headers = request.headers.clone();

        // A dial in progress does not hold up a finished call
        let connected = tokio::select! {
            biased;
            _ = ctx.done() => None,
            result = client.connection().get() => Some(result),
        };
        let transport = match connected {
            Some(Ok(transport)) => transport,
            Some(Err(e)) => {
                error!(error = %e, "get client connection failed");
                return Err(InvokeError::new(e));
            }
            None => {
                let reason = ctx.done_reason().unwrap_or("context cancelled");
                error!(url = %url, reason, "call finished before the connection was ready");
                return Err(InvokeError::new(StackError::wrap(registry, codes::HTTP_ERROR, reason)));
            }
        };

        debug!(url = %request.url, headers = ?request.headers, "before send");
        let sent = tokio::select! {
            biased;
            _ = ctx.done() => Err(TransportError::Cancelled(
                ctx.done_reason().unwrap_or("context cancelled").to_string(),
            )),
            result = send_with_timeout(transport.as_ref(), request, timeout) => result,
        };
        let response = sent.map_err(|e| {
            error!(url = %url, error = %e, "send failed");
            InvokeError::new(StackError::wrap_error(registry, codes::HTTP_ERROR, e))
        })?;

        let raw = RawResponse {
            status_code: response.status,
            status: response.status_text,
            headers: response.headers,
            body: response.body,
            cookies: response.cookies,
            request_url: url,
            request_addr,
            request_headers,
        };
        debug!(status = raw.status_code, bytes = raw.body.len(), "after send");

        if !info.response_not_parse {
            if let Some(reply) = invocation.reply.as_deref_mut() {
                if let Err(e) = reply.decode(&raw.body) {
                    error!(error = %e, "decode response body failed");
                    let err = StackError::wrap_error(registry, codes::RESPONSE_PARSE, e);
                    return Err(InvokeError::with_response(err, raw));
                }
                debug!(reply = ?reply, "after parse");
            }
        }

        Ok(raw)
    }
}

// A zero timeout means none; the context deadline always caps it
fn effective_timeout(
    configured: Option<Duration>,
    remaining: Option<Duration>,
) -> Option<Duration> {
    let configured = configured.filter(|t| !t.is_zero());
    match (configured, remaining) {
        (Some(t), Some(r)) => Some(t.min(r)),
        (t, r) => t.or(r),
    }
}

fn with_query(url: &str, query: &Query) -> Result<String, String> {
    if query.is_empty() {
        return Ok(url.to_string());
    }

    let mut parsed = reqwest::Url::parse(url).map_err(|e| format!("{}: {}", url, e))?;
    {
        let mut pairs = parsed.query_pairs_mut();
        for (key, value) in query.pairs() {
            pairs.append_pair(key, value);
        }
    }
    Ok(parsed.into())
}

async fn send_with_timeout(
    transport: &dyn Transport,
    request: TransportRequest,
    timeout: Option<Duration>,
) -> Result<TransportResponse, TransportError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, transport.send(request))
            .await
            .unwrap_or(Err(TransportError::Timeout(limit))),
        None => transport.send(request).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_timeout() {
        let s = Duration::from_secs;
        assert_eq!(effective_timeout(Some(s(5)), None), Some(s(5)));
        assert_eq!(effective_timeout(Some(s(5)), Some(s(2))), Some(s(2)));
        assert_eq!(effective_timeout(Some(Duration::ZERO), Some(s(2))), Some(s(2)));
        assert_eq!(effective_timeout(Some(Duration::ZERO), None), None);
        assert_eq!(effective_timeout(None, None), None);
    }

    #[test]
    fn test_with_query() {
        let mut query = Query::new();
        query.insert("page", "2");
        query.add("tag", "a b");
        assert_eq!(
            with_query("http://svc/items", &query).unwrap(),
            "http://svc/items?page=2&tag=a+b"
        );
        assert_eq!(with_query("no scheme", &Query::new()).unwrap(), "no scheme");
        assert!(with_query("no scheme", &query).is_err());
    }

    #[test]
    fn test_raw_response_success_range() {
        let mut raw = RawResponse::default();
        raw.status_code = 204;
        assert!(raw.is_success());
        raw.status_code = 302;
        assert!(!raw.is_success());
    }
}

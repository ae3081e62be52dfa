// Logging interceptor
// Debug enter/finish records plus one access line per call

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, error, info};

use super::LOGGING;
use crate::chain::{Interceptor, Invocation, InvokeResult, Next};
use crate::context::CallContext;
use crate::skipper::{should_skip, Skipper};

pub struct LoggingInterceptor {
    skippers: Vec<Skipper>,
}

impl LoggingInterceptor {
    pub fn new(skippers: &[Skipper]) -> Self {
        Self {
            skippers: skippers.to_vec(),
        }
    }
}

pub fn build(skippers: &[Skipper]) -> Arc<dyn Interceptor> {
    Arc::new(LoggingInterceptor::new(skippers))
}

#[async_trait]
impl Interceptor for LoggingInterceptor {
    fn name(&self) -> &str {
        LOGGING
    }

    fn should_skip(&self, method: &str, target: &str) -> bool {
        should_skip(&self.skippers, method, target)
    }

    async fn intercept(
        &self,
        ctx: &CallContext,
        invocation: &mut Invocation<'_>,
        next: Next<'_>,
    ) -> InvokeResult {
        debug!(
            interceptor = LOGGING,
            method = %invocation.method,
            path = %invocation.target,
            request_id = ctx.request_id().unwrap_or_default(),
            started_at = %Utc::now().to_rfc3339(),
            "interceptor enter"
        );
        let started = Instant::now();

        let result = next.run(ctx, invocation).await;
        let latency = started.elapsed();

        let outcome = match result {
            Ok(response) => {
                info!(
                    "{:3} - [{}] {:?} {}  {}",
                    response.status_code,
                    response.request_addr,
                    latency,
                    invocation.method,
                    response.request_url
                );
                Ok(response)
            }
            Err(err) => {
                let (status, addr, url) = match &err.response {
                    Some(r) => (r.status_code, r.request_addr.as_str(), r.request_url.as_str()),
                    None => (0, invocation.client.address(), invocation.target.as_str()),
                };
                info!("{:3} - [{}] {:?} {}  {}", status, addr, latency, invocation.method, url);
                error!(
                    code = err.code(),
                    request_id = ctx.request_id().unwrap_or_default(),
                    error = %err.error,
                    "call failed"
                );
                Err(err.update_stack(invocation.codes()))
            }
        };

        debug!(interceptor = LOGGING, "interceptor finish");
        outcome
    }
}

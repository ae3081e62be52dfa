// Context interceptor
// Runs the rest of the chain inside a span tagged with the call's identity

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info_span, Instrument};

use super::CONTEXT;
use crate::chain::{Interceptor, Invocation, InvokeResult, Next};
use crate::context::CallContext;
use crate::skipper::{should_skip, Skipper};

pub struct ContextInterceptor {
    skippers: Vec<Skipper>,
}

impl ContextInterceptor {
    pub fn new(skippers: &[Skipper]) -> Self {
        Self {
            skippers: skippers.to_vec(),
        }
    }
}

pub fn build(skippers: &[Skipper]) -> Arc<dyn Interceptor> {
    Arc::new(ContextInterceptor::new(skippers))
}

#[async_trait]
impl Interceptor for ContextInterceptor {
    fn name(&self) -> &str {
        CONTEXT
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
        let span = info_span!(
            "call",
            request_id = ctx.request_id().unwrap_or_default(),
            method = %invocation.method,
            path = %invocation.target,
            address = invocation.client.address(),
        );
        for (key, value) in ctx.fields() {
            debug!(parent: &span, field = %key, value = %value, "call field");
        }

        next.run(ctx, invocation).instrument(span).await
    }
}

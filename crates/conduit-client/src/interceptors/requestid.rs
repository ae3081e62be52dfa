// Request id interceptor
// Makes sure every call carries an x-request-id

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::{REQUEST_ID, REQUEST_ID_HEADER};
use crate::chain::{Interceptor, Invocation, InvokeResult, Next};
use crate::context::CallContext;
use crate::options::CallOption;
use crate::skipper::{should_skip, Skipper};

pub struct RequestIdInterceptor {
    skippers: Vec<Skipper>,
}

impl RequestIdInterceptor {
    pub fn new(skippers: &[Skipper]) -> Self {
        Self {
            skippers: skippers.to_vec(),
        }
    }
}

pub fn build(skippers: &[Skipper]) -> Arc<dyn Interceptor> {
    Arc::new(RequestIdInterceptor::new(skippers))
}

#[async_trait]
impl Interceptor for RequestIdInterceptor {
    fn name(&self) -> &str {
        REQUEST_ID
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
        let request_id = match ctx.request_id() {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };
        debug!(interceptor = REQUEST_ID, %request_id, "interceptor enter");

        invocation.options.push(CallOption::SetHeader(
            REQUEST_ID_HEADER.to_string(),
            vec![request_id.clone()],
        ));

        // Derived context: same cancellation token, new id
        let ctx = ctx.with_request_id(request_id);
        next.run(&ctx, invocation).await
    }
}

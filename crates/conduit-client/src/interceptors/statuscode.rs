// Status code interceptor
// Rejects non-2xx responses before the reply is decoded

use std::sync::Arc;

use async_trait::async_trait;
use conduit_error::{codes, StackError};
use tracing::{debug, error};

use super::STATUS_CODE;
use crate::chain::{Interceptor, InvokeError, Invocation, InvokeResult, Next};
use crate::context::CallContext;
use crate::options::CallOption;
use crate::skipper::{should_skip, Skipper};

pub struct StatusCodeInterceptor {
    skippers: Vec<Skipper>,
}

impl StatusCodeInterceptor {
    pub fn new(skippers: &[Skipper]) -> Self {
        Self {
            skippers: skippers.to_vec(),
        }
    }
}

pub fn build(skippers: &[Skipper]) -> Arc<dyn Interceptor> {
    Arc::new(StatusCodeInterceptor::new(skippers))
}

#[async_trait]
impl Interceptor for StatusCodeInterceptor {
    fn name(&self) -> &str {
        STATUS_CODE
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
        debug!(interceptor = STATUS_CODE, "interceptor enter");
        let registry = invocation.codes();

        // The body is decoded here, after the status check
        invocation.options.push(CallOption::ResponseNotParse);

        let response = next
            .run(ctx, invocation)
            .await
            .map_err(|e| e.update_stack(registry))?;

        if !response.is_success() {
            error!(
                status = response.status_code,
                url = %response.request_url,
                "response status is not successful"
            );
            let err = StackError::wrap(
                registry,
                codes::HTTP_ERROR,
                format!("response status is {} {}", response.status_code, response.status),
            );
            return Err(InvokeError::with_response(err, response));
        }

        if let Some(reply) = invocation.reply.as_deref_mut() {
            if let Err(e) = reply.decode(&response.body) {
                error!(error = %e, "decode response body failed");
                let err = StackError::wrap_error(registry, codes::RESPONSE_PARSE, e);
                return Err(InvokeError::with_response(err, response));
            }
        }

        debug!(interceptor = STATUS_CODE, "interceptor finish");
        Ok(response)
    }
}

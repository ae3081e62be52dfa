// Call status interceptor
// Turns the call status of every structured reply into the call's result

use std::sync::Arc;

use async_trait::async_trait;
use conduit_callstatus::{to_error, CallStatusField, HasCallStatus};
use conduit_error::{codes, StackError};
use tracing::{debug, error};

use super::CALL_STATUS;
use crate::chain::{Interceptor, InvokeError, Invocation, InvokeResult, Next};
use crate::context::CallContext;
use crate::skipper::{should_skip, Skipper};

pub struct CallStatusInterceptor {
    skippers: Vec<Skipper>,
}

impl CallStatusInterceptor {
    pub fn new(skippers: &[Skipper]) -> Self {
        Self {
            skippers: skippers.to_vec(),
        }
    }
}

pub fn build(skippers: &[Skipper]) -> Arc<dyn Interceptor> {
    Arc::new(CallStatusInterceptor::new(skippers))
}

#[async_trait]
impl Interceptor for CallStatusInterceptor {
    fn name(&self) -> &str {
        CALL_STATUS
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
        debug!(interceptor = CALL_STATUS, "interceptor enter");
        let registry = invocation.codes();

        let response = match next.run(ctx, invocation).await {
            Ok(response) => response,
            Err(err) => return Err(err.update_stack(registry)),
        };

        // A reply that is missing, or not decoded yet because an inner stage
        // deferred decoding, leaves the raw body to carry the status
        let deferred = invocation.call_info().response_not_parse;
        let body_value;
        let checked = {
            let field = match invocation.reply.as_deref().filter(|_| !deferred) {
                Some(reply) => reply.call_status(),
                None => match serde_json::from_slice::<serde_json::Value>(&response.body) {
                    Ok(value) => {
                        body_value = value;
                        body_value.call_status()
                    }
                    Err(e) => CallStatusField::Invalid(e.to_string()),
                },
            };

            match field {
                CallStatusField::Present(status) => Ok(to_error(registry, Some(status.as_ref()))),
                CallStatusField::Absent => Err("reply has no call status field".to_string()),
                CallStatusField::Null => Err("reply call status is null".to_string()),
                CallStatusField::Invalid(e) => Err(format!("reply call status is invalid: {}", e)),
            }
        };

        let violation = match checked {
            Ok(None) => return Ok(response),
            Ok(Some(mut err)) => {
                error!(code = err.code(), error = %err, "remote call returned an error");
                err.push_frame(registry);
                return Err(InvokeError::with_response(err, response));
            }
            Err(violation) => violation,
        };

        error!(interceptor = CALL_STATUS, reason = %violation, "call status missing");
        let err = StackError::wrap(registry, codes::CALL_STATUS_VIOLATION, violation);
        Err(InvokeError::with_response(err, response))
    }
}

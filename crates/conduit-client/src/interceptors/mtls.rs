// Mutual TLS interceptor
// Refuses to dispatch unless the client presents a certificate

use std::sync::Arc;

use async_trait::async_trait;
use conduit_error::{codes, StackError};
use tracing::{debug, warn};

use super::MTLS;
use crate::chain::{Interceptor, InvokeError, Invocation, InvokeResult, Next};
use crate::context::CallContext;
use crate::skipper::{should_skip, Skipper};
use crate::tls::TlsMode;

pub struct MtlsInterceptor {
    skippers: Vec<Skipper>,
}

impl MtlsInterceptor {
    pub fn new(skippers: &[Skipper]) -> Self {
        Self {
            skippers: skippers.to_vec(),
        }
    }
}

pub fn build(skippers: &[Skipper]) -> Arc<dyn Interceptor> {
    Arc::new(MtlsInterceptor::new(skippers))
}

#[async_trait]
impl Interceptor for MtlsInterceptor {
    fn name(&self) -> &str {
        MTLS
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
        debug!(interceptor = MTLS, "interceptor enter");
        let registry = invocation.codes();

        let mode = invocation.client.tls_mode();
        if mode != TlsMode::MutualTls {
            warn!(
                interceptor = MTLS,
                %mode,
                path = %invocation.target,
                "refusing call without client certificate"
            );
            let err = StackError::wrap(
                registry,
                codes::CLIENT_CERTIFICATE,
                format!("mutual tls is required, client runs in {} mode", mode),
            );
            return Err(InvokeError::new(err));
        }

        next.run(ctx, invocation)
            .await
            .map_err(|e| e.update_stack(registry))
    }
}

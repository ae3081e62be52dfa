// Recovery interceptor
// Converts panics from deeper stages into coded errors

use std::any::Any;
use std::cell::RefCell;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Once};

use async_trait::async_trait;
use conduit_error::{codes, CallSite, StackError};
use futures::FutureExt;
use tracing::{debug, error};

use super::RECOVERY;
use crate::chain::{Interceptor, InvokeError, Invocation, InvokeResult, Next};
use crate::context::CallContext;
use crate::skipper::{should_skip, Skipper};

thread_local! {
    static PANIC_SITE: RefCell<Option<CallSite>> = const { RefCell::new(None) };
}

static INSTALL_HOOK: Once = Once::new();

// Records where the last panic on this thread happened, then defers to the
// previous hook.
fn install_panic_hook() {
    INSTALL_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if let Some(location) = info.location() {
                let site = CallSite::from_location(location);
                PANIC_SITE.with(|slot| *slot.borrow_mut() = Some(site));
            }
            previous(info);
        }));
    });
}

fn take_panic_site() -> Option<CallSite> {
    PANIC_SITE.with(|site| site.borrow_mut().take())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub struct RecoveryInterceptor {
    skippers: Vec<Skipper>,
}

impl RecoveryInterceptor {
    pub fn new(skippers: &[Skipper]) -> Self {
        install_panic_hook();
        Self {
            skippers: skippers.to_vec(),
        }
    }
}

pub fn build(skippers: &[Skipper]) -> Arc<dyn Interceptor> {
    Arc::new(RecoveryInterceptor::new(skippers))
}

#[async_trait]
impl Interceptor for RecoveryInterceptor {
    fn name(&self) -> &str {
        RECOVERY
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
        debug!(interceptor = RECOVERY, "interceptor enter");
        take_panic_site();

        let outcome = AssertUnwindSafe(next.run(ctx, invocation)).catch_unwind().await;
        let payload = match outcome {
            Ok(result) => return result,
            Err(payload) => payload,
        };

        let registry = invocation.codes();
        let message = panic_message(payload.as_ref());
        error!(
            interceptor = RECOVERY,
            panic = %message,
            method = %invocation.method,
            path = %invocation.target,
            "recovered from panic"
        );

        let description = format!("panic: {}", message);
        let mut err = match take_panic_site() {
            Some(site) => StackError::wrap_at(registry, site, codes::UNKNOWN, description),
            None => StackError::wrap(registry, codes::UNKNOWN, description),
        };
        err.push_frame(registry);
        Err(InvokeError::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn test_hook_records_panic_site() {
        install_panic_hook();
        take_panic_site();
        let result = std::panic::catch_unwind(|| panic!("recorded"));
        assert!(result.is_err());

        let site = take_panic_site().unwrap();
        assert!(site.file.ends_with("recovery.rs"));
        assert_eq!(site.line, line!() - 5);
    }
}

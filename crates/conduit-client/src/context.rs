// Call context
// Cancellation, deadline and request-scoped fields threaded through every stage

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Request-scoped state for one call
///
/// Derived contexts share the parent's cancellation token, so cancelling any
/// of them cancels the whole call tree below the original.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
    request_id: Option<Arc<str>>,
    fields: Arc<BTreeMap<String, String>>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context driven by an existing token
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            token,
            ..Self::default()
        }
    }

    /// Derive a context that expires after `timeout`, never later than the parent
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let mut ctx = self.clone();
        ctx.deadline = Some(match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        });
        ctx
    }

    pub fn with_request_id(&self, request_id: impl Into<String>) -> Self {
        let mut ctx = self.clone();
        ctx.request_id = Some(Arc::from(request_id.into()));
        ctx
    }

    pub fn with_field(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut ctx = self.clone();
        Arc::make_mut(&mut ctx.fields).insert(key.into(), value.into());
        ctx
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, zero once it has passed
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.map_or(false, |d| Instant::now() >= d)
    }

    /// Whether the call should stop, for either reason
    pub fn is_done(&self) -> bool {
        self.is_cancelled() || self.is_expired()
    }

    /// Resolves once the context is cancelled or its deadline passes
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// Why the context finished, if it has
    pub fn done_reason(&self) -> Option<&'static str> {
        if self.is_cancelled() {
            Some("context cancelled")
        } else if self.is_expired() {
            Some("context deadline exceeded")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_contexts_share_cancellation() {
        let root = CallContext::new();
        let child = root.with_request_id("r-1").with_field("tenant", "acme");

        assert!(!child.is_cancelled());
        root.cancel();
        assert!(child.is_cancelled());
        assert_eq!(child.done_reason(), Some("context cancelled"));
    }

    #[test]
    fn test_fields_do_not_leak_to_parent() {
        let root = CallContext::new().with_field("a", "1");
        let child = root.with_field("b", "2");
        assert_eq!(root.field("b"), None);
        assert_eq!(child.field("a"), Some("1"));
        assert_eq!(child.field("b"), Some("2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_never_extends() {
        let ctx = CallContext::new().with_timeout(Duration::from_millis(50));
        let longer = ctx.with_timeout(Duration::from_secs(10));
        assert_eq!(longer.deadline(), ctx.deadline());

        tokio::time::advance(Duration::from_millis(60)).await;
        assert!(longer.is_expired());
        assert_eq!(longer.remaining(), Some(Duration::ZERO));
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_resolves_on_deadline() {
        let ctx = CallContext::new().with_timeout(Duration::from_millis(20));
        ctx.done().await;
        assert!(ctx.is_done());
        assert!(!ctx.is_cancelled());
    }
}

// Shared helpers for the integration tests
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use conduit_client::{
    CallContext, Client, ClientBuilder, CoderRegistry, Interceptor, InterceptorRegistry, Invocation,
    InvokeResult, ModuleInfo, Next,
};
use conduit_client::mock::MockConnector;
use parking_lot::Mutex;

pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn events(log: &EventLog) -> Vec<String> {
    log.lock().clone()
}

/// Records its pre and post logic into a shared log
pub struct Recorder {
    pub name: &'static str,
    pub log: EventLog,
    pub skip_prefix: Option<&'static str>,
}

impl Recorder {
    pub fn new(name: &'static str, log: &EventLog) -> Arc<Self> {
        Arc::new(Self {
            name,
            log: log.clone(),
            skip_prefix: None,
        })
    }

    pub fn skipping(name: &'static str, log: &EventLog, prefix: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            log: log.clone(),
            skip_prefix: Some(prefix),
        })
    }
}

#[async_trait]
impl Interceptor for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    fn should_skip(&self, _method: &str, target: &str) -> bool {
        self.skip_prefix.map_or(false, |p| target.starts_with(p))
    }

    async fn intercept(
        &self,
        ctx: &CallContext,
        invocation: &mut Invocation<'_>,
        next: Next<'_>,
    ) -> InvokeResult {
        self.log.lock().push(format!("{}-pre", self.name));
        let result = next.run(ctx, invocation).await;
        self.log.lock().push(format!("{}-post", self.name));
        result
    }
}

pub fn codes(module: &str) -> Arc<CoderRegistry> {
    Arc::new(CoderRegistry::new(ModuleInfo::new(module).with_host("test-host")))
}

/// A client on `http://orders.test` over the given mock
pub fn client_builder(connector: &Arc<MockConnector>) -> ClientBuilder {
    Client::builder("http://orders.test")
        .with_codes(codes("orders-client"))
        .with_connector(connector.clone())
}

/// A registry with the built-ins plus recorders `A` and `B`
pub fn recording_registry(log: &EventLog) -> Arc<InterceptorRegistry> {
    let registry = InterceptorRegistry::with_defaults();
    registry.register_instance("A", Recorder::new("A", log)).unwrap();
    registry.register_instance("B", Recorder::new("B", log)).unwrap();
    Arc::new(registry)
}

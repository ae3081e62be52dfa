// Interceptor registry
// Name to factory table used to assemble chains

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use crate::chain::Interceptor;
use crate::config::ConfigError;
use crate::interceptors;
use crate::skipper::Skipper;

/// Builds an interceptor for a client's skippers
pub type InterceptorFactory = Arc<dyn Fn(&[Skipper]) -> Arc<dyn Interceptor> + Send + Sync>;

/// Registered interceptors by name
///
/// Filled at startup and shared by every client built from it.
pub struct InterceptorRegistry {
    factories: RwLock<HashMap<String, InterceptorFactory>>,
}

impl InterceptorRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// A registry holding every built-in interceptor
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        {
            let mut factories = registry.factories.write();
            for (name, factory) in interceptors::builtin() {
                factories.insert(name.to_string(), factory);
            }
        }
        registry
    }

    /// Register a factory under a new name
    pub fn register<F>(&self, name: impl Into<String>, factory: F) -> Result<(), ConfigError>
    where
        F: Fn(&[Skipper]) -> Arc<dyn Interceptor> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut factories = self.factories.write();
        if factories.contains_key(&name) {
            return Err(ConfigError::DuplicateInterceptor(name));
        }
        factories.insert(name, Arc::new(factory));
        Ok(())
    }

    /// Register a ready-made interceptor that ignores skippers
    pub fn register_instance(
        &self,
        name: impl Into<String>,
        interceptor: Arc<dyn Interceptor>,
    ) -> Result<(), ConfigError> {
        self.register(name, move |_: &[Skipper]| interceptor.clone())
    }

    /// Build the chain for `names`, in order
    ///
    /// Names that are not registered are skipped with a warning.
    pub fn resolve<S: AsRef<str>>(
        &self,
        names: &[S],
        skippers: &[Skipper],
    ) -> Vec<Arc<dyn Interceptor>> {
        let factories = self.factories.read();
        names
            .iter()
            .filter_map(|name| {
                let name = name.as_ref();
                match factories.get(name) {
                    Some(factory) => Some(factory(skippers)),
                    None => {
                        warn!(interceptor = name, "unknown interceptor, skipped");
                        None
                    }
                }
            })
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.read().contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for InterceptorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for InterceptorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptors::{
        CALL_STATUS, CONTEXT, LOGGING, MTLS, RECOVERY, REQUEST_ID, STATUS_CODE,
    };

    #[test]
    fn test_defaults() {
        let registry = InterceptorRegistry::with_defaults();
        assert_eq!(
            registry.names(),
            vec![CALL_STATUS, CONTEXT, LOGGING, MTLS, RECOVERY, REQUEST_ID, STATUS_CODE]
        );
    }

    #[test]
    fn test_resolve_keeps_order_and_drops_unknown() {
        let registry = InterceptorRegistry::with_defaults();
        let chain = registry.resolve(&["recovery", "nope", "logging"], &[]);
        let names: Vec<&str> = chain.iter().map(|i| i.name()).collect();
        assert_eq!(names, vec![RECOVERY, LOGGING]);
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let registry = InterceptorRegistry::with_defaults();
        let err = registry
            .register(LOGGING, |s: &[Skipper]| interceptors::logging::build(s))
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateInterceptor(name) if name == LOGGING));
    }

    #[test]
    fn test_register_instance() {
        let registry = InterceptorRegistry::new();
        registry
            .register_instance("audit", interceptors::requestid::build(&[]))
            .unwrap();
        assert!(registry.contains("audit"));
        assert_eq!(registry.resolve(&["audit"], &[]).len(), 1);
    }
}

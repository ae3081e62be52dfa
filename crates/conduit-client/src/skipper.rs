// Skippers
// Per-call predicates that let an interceptor stand aside

use std::fmt;
use std::sync::Arc;

/// Decides from (method, target) whether an interceptor skips a call
#[derive(Clone)]
pub struct Skipper(Arc<dyn Fn(&str, &str) -> bool + Send + Sync>);

impl Skipper {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&str, &str) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(predicate))
    }

    /// Skip targets starting with any of `prefixes`
    pub fn path_prefix<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prefixes = collect(prefixes);
        Self::new(move |_, target| prefixes.iter().any(|p| target.starts_with(p.as_str())))
    }

    /// Skip every target except those starting with one of `prefixes`
    pub fn path_prefix_except<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prefixes = collect(prefixes);
        Self::new(move |_, target| !prefixes.iter().any(|p| target.starts_with(p.as_str())))
    }

    /// Skip calls using one of `methods`, compared case-insensitively
    pub fn methods<I, S>(methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let methods = collect(methods);
        Self::new(move |method, _| methods.iter().any(|m| m.eq_ignore_ascii_case(method)))
    }

    pub fn matches(&self, method: &str, target: &str) -> bool {
        (self.0)(method, target)
    }
}

fn collect<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

impl fmt::Debug for Skipper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Skipper(..)")
    }
}

/// True when any skipper matches
pub fn should_skip(skippers: &[Skipper], method: &str, target: &str) -> bool {
    skippers.iter().any(|s| s.matches(method, target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_prefix() {
        let skipper = Skipper::path_prefix(["/healthz", "/metrics"]);
        assert!(skipper.matches("GET", "/healthz/live"));
        assert!(!skipper.matches("GET", "/v1/orders"));
    }

    #[test]
    fn test_path_prefix_except() {
        let skipper = Skipper::path_prefix_except(["/v1/"]);
        assert!(!skipper.matches("GET", "/v1/orders"));
        assert!(skipper.matches("GET", "/internal"));
    }

    #[test]
    fn test_methods() {
        let skipper = Skipper::methods(["head", "OPTIONS"]);
        assert!(skipper.matches("HEAD", "/"));
        assert!(!skipper.matches("POST", "/"));
    }

    #[test]
    fn test_should_skip_any() {
        let skippers = vec![Skipper::methods(["GET"]), Skipper::path_prefix(["/ping"])];
        assert!(should_skip(&skippers, "POST", "/ping"));
        assert!(should_skip(&skippers, "GET", "/orders"));
        assert!(!should_skip(&skippers, "POST", "/orders"));
        assert!(!should_skip(&[], "GET", "/"));
    }
}

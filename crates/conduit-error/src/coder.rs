// Coder and registry
// Maps numeric codes to HTTP-equivalent statuses and localized messages

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::codes;
use crate::frame::ModuleInfo;

/// English locale key
pub const LOCALE_EN: &str = "en";
/// Chinese locale key
pub const LOCALE_ZH: &str = "zh";

/// A registered error code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coder {
    code: i64,
    http_status: u16,
    messages: HashMap<String, String>,
}

impl Coder {
    /// Create a coder without any messages
    pub fn new(code: i64, http_status: u16) -> Self {
        Self {
            code,
            http_status,
            messages: HashMap::new(),
        }
    }

    /// Attach a message for one locale
    pub fn with_message(mut self, locale: impl Into<String>, message: impl Into<String>) -> Self {
        self.messages.insert(locale.into(), message.into());
        self
    }

    pub fn code(&self) -> i64 {
        self.code
    }

    pub fn http_status(&self) -> u16 {
        self.http_status
    }

    pub fn messages(&self) -> &HashMap<String, String> {
        &self.messages
    }

    /// Message for a locale, falling back to English and then to nothing
    pub fn message(&self, locale: &str) -> &str {
        self.messages
            .get(locale)
            .or_else(|| self.messages.get(LOCALE_EN))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Errors raised by the coder registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("error code {0} is already registered with a different definition")]
    DuplicateCode(i64),

    #[error("error code {0} is reserved")]
    Reserved(i64),
}

/// Registry of error codes for one process
///
/// Writes happen at startup; lookups take a shared lock and never fail.
#[derive(Debug)]
pub struct CoderRegistry {
    coders: RwLock<HashMap<i64, Arc<Coder>>>,
    unknown: Arc<Coder>,
    module: ModuleInfo,
}

impl CoderRegistry {
    /// Create a registry seeded with the base code table
    pub fn new(module: ModuleInfo) -> Self {
        let mut coders = HashMap::new();
        let mut unknown = Arc::new(Coder::new(codes::UNKNOWN, 500));
        for coder in codes::base_coders() {
            let coder = Arc::new(coder);
            if coder.code() == codes::UNKNOWN {
                unknown = coder.clone();
            }
            coders.insert(coder.code(), coder);
        }

        Self {
            coders: RwLock::new(coders),
            unknown,
            module,
        }
    }

    /// Register a coder
    ///
    /// Registering an identical coder twice is a no-op. A different coder under
    /// an existing code is rejected, and the Unknown code can never be replaced.
    pub fn register(&self, coder: Coder) -> Result<(), RegistryError> {
        if coder.code() == codes::UNKNOWN && coder != *self.unknown {
            return Err(RegistryError::Reserved(coder.code()));
        }

        let mut coders = self.coders.write();
        if let Some(existing) = coders.get(&coder.code()) {
            if **existing == coder {
                return Ok(());
            }
            return Err(RegistryError::DuplicateCode(coder.code()));
        }

        coders.insert(coder.code(), Arc::new(coder));
        Ok(())
    }

    /// Register a coder, panicking on any conflict
    pub fn must_register(&self, coder: Coder) {
        if let Err(e) = self.register(coder) {
            panic!("{}", e);
        }
    }

    /// Register several coders, stopping at the first conflict
    pub fn register_all(
        &self,
        coders: impl IntoIterator<Item = Coder>,
    ) -> Result<(), RegistryError> {
        for coder in coders {
            self.register(coder)?;
        }
        Ok(())
    }

    /// Resolve a code, falling back to the Unknown coder
    pub fn lookup(&self, code: i64) -> Arc<Coder> {
        self.coders
            .read()
            .get(&code)
            .cloned()
            .unwrap_or_else(|| self.unknown.clone())
    }

    pub fn is_registered(&self, code: i64) -> bool {
        self.coders.read().contains_key(&code)
    }

    pub fn unknown(&self) -> Arc<Coder> {
        self.unknown.clone()
    }

    pub fn success_code(&self) -> i64 {
        codes::SUCCESS
    }

    pub fn module(&self) -> &ModuleInfo {
        &self.module
    }
}

impl Default for CoderRegistry {
    fn default() -> Self {
        Self::new(ModuleInfo::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> CoderRegistry {
        CoderRegistry::new(ModuleInfo::new("test-svc"))
    }

    #[test]
    fn test_lookup_unknown_falls_back() {
        let registry = registry();
        let coder = registry.lookup(424242);
        assert_eq!(coder.code(), codes::UNKNOWN);
        assert_eq!(coder.http_status(), 500);
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = registry();
        registry
            .register(Coder::new(200001, 404).with_message(LOCALE_EN, "User not found."))
            .unwrap();

        let coder = registry.lookup(200001);
        assert_eq!(coder.code(), 200001);
        assert_eq!(coder.http_status(), 404);
        assert_eq!(coder.message(LOCALE_EN), "User not found.");
        // zh falls back to en
        assert_eq!(coder.message(LOCALE_ZH), "User not found.");
    }

    #[test]
    fn test_register_identical_is_idempotent() {
        let registry = registry();
        let coder = Coder::new(200002, 400).with_message(LOCALE_EN, "Bad input.");
        assert!(registry.register(coder.clone()).is_ok());
        assert!(registry.register(coder).is_ok());
    }

    #[test]
    fn test_register_conflict_is_rejected() {
        let registry = registry();
        registry.register(Coder::new(200003, 400)).unwrap();
        let err = registry.register(Coder::new(200003, 409)).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateCode(200003));
        assert_eq!(registry.lookup(200003).http_status(), 400);
    }

    #[test]
    fn test_unknown_is_reserved() {
        let registry = registry();
        let err = registry.register(Coder::new(codes::UNKNOWN, 418)).unwrap_err();
        assert_eq!(err, RegistryError::Reserved(codes::UNKNOWN));
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_must_register_panics_on_conflict() {
        let registry = registry();
        registry.must_register(Coder::new(200004, 400));
        registry.must_register(Coder::new(200004, 500));
    }
}

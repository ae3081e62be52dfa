// Call status
// Conversion between StackError and its wire form

use std::collections::HashMap;

use conduit_error::{CoderRegistry, StackError};
use serde::{Deserialize, Serialize};

/// Wire form of an error
///
/// A success status never carries a stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallStatus {
    /// Registered error code
    pub code: i64,
    /// Messages by locale, as known to the sender
    pub message: HashMap<String, String>,
    /// Serialized frames, oldest first
    pub stack: Vec<String>,
    pub description: String,
}

impl CallStatus {
    /// A success status from the registry's success coder
    pub fn success(registry: &CoderRegistry) -> Self {
        let coder = registry.lookup(registry.success_code());
        Self {
            code: coder.code(),
            message: coder.messages().clone(),
            stack: Vec::new(),
            description: String::new(),
        }
    }

    pub fn is_success(&self, registry: &CoderRegistry) -> bool {
        self.code == registry.success_code()
    }
}

/// Project an error onto the wire; `None` is success
pub fn from_error(registry: &CoderRegistry, err: Option<&StackError>) -> CallStatus {
    let Some(err) = err else {
        return CallStatus::success(registry);
    };

    let mut status = CallStatus {
        code: err.code(),
        message: err.messages().clone(),
        stack: err.stack().to_vec(),
        description: err.description().to_string(),
    };

    if status.is_success(registry) {
        status.stack.clear();
    }
    status
}

/// Status for a handler result
pub fn from_result<T>(registry: &CoderRegistry, result: &Result<T, StackError>) -> CallStatus {
    from_error(registry, result.as_ref().err())
}

/// Rebuild the error a status describes
///
/// Missing and success statuses yield `None`. Messages come from the local
/// registry, not from the wire.
pub fn to_error(registry: &CoderRegistry, status: Option<&CallStatus>) -> Option<StackError> {
    let status = status?;
    if status.is_success(registry) {
        return None;
    }

    Some(StackError::wrap_stack(
        registry,
        status.code,
        status.description.clone(),
        status.stack.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_error::{codes, Coder, ModuleInfo, LOCALE_EN, LOCALE_ZH};

    fn registry() -> CoderRegistry {
        let registry = CoderRegistry::new(ModuleInfo::new("inventory"));
        registry.must_register(
            Coder::new(300001, 409)
                .with_message(LOCALE_EN, "Out of stock.")
                .with_message(LOCALE_ZH, "库存不足"),
        );
        registry
    }

    #[test]
    fn test_round_trip_keeps_code_and_stack() {
        let registry = registry();
        let err = StackError::wrap(&registry, 300001, "sku 12");
        let err = StackError::update_stack(&registry, err);

        let status = from_error(&registry, Some(&err));
        let back = to_error(&registry, Some(&status)).unwrap();

        assert_eq!(back.code(), err.code());
        assert_eq!(back.stack(), err.stack());
        assert_eq!(back.description(), "sku 12");
    }

    #[test]
    fn test_success_round_trip() {
        let registry = registry();
        let status = from_error(&registry, None);
        assert!(status.stack.is_empty());
        assert_eq!(status.code, codes::SUCCESS);
        assert!(to_error(&registry, Some(&status)).is_none());
        assert!(to_error(&registry, None).is_none());
    }

    #[test]
    fn test_success_error_never_leaks_stack() {
        let registry = registry();
        let err = StackError::wrap(&registry, codes::SUCCESS, "ok");
        let status = from_error(&registry, Some(&err));
        assert!(status.stack.is_empty());
    }

    #[test]
    fn test_messages_are_resolved_by_receiver() {
        let sender = registry();
        let err = StackError::wrap(&sender, 300001, "sku 12");
        let mut status = from_error(&sender, Some(&err));
        status.message.insert(LOCALE_EN.to_string(), "tampered".to_string());

        let receiver = registry();
        let back = to_error(&receiver, Some(&status)).unwrap();
        assert_eq!(back.message(LOCALE_EN), "Out of stock.");
    }

    #[test]
    fn test_unregistered_remote_code_becomes_unknown() {
        let registry = registry();
        let status = CallStatus {
            code: 777777,
            description: "boom".to_string(),
            stack: vec!["host:h,pid:1,module:m,code:777777,file:f,func:g,line:2".to_string()],
            ..Default::default()
        };
        let err = to_error(&registry, Some(&status)).unwrap();
        assert_eq!(err.code(), codes::UNKNOWN);
        assert_eq!(err.stack().len(), 1);
    }

    #[test]
    fn test_wire_shape() {
        let registry = registry();
        let err = StackError::wrap(&registry, 300001, "sku 12");
        let value = serde_json::to_value(from_error(&registry, Some(&err))).unwrap();

        assert_eq!(value["code"], 300001);
        assert_eq!(value["message"]["zh"], "库存不足");
        assert_eq!(value["description"], "sku 12");
        assert_eq!(value["stack"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_from_result() {
        let registry = registry();
        let ok: Result<(), StackError> = Ok(());
        assert_eq!(from_result(&registry, &ok).code, codes::SUCCESS);
    }
}

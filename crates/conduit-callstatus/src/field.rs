// Call status field
// Static access to the status carried by a reply type

use std::borrow::Cow;

use serde::Deserialize;

use crate::status::CallStatus;

/// JSON key of the status in HTTP replies
pub const FIELD_NAME: &str = "callStatus";
/// Field name used by RPC messages
pub const FIELD_NAME_PASCAL: &str = "CallStatus";

/// What a reply exposes in its status slot
#[derive(Debug, Clone, PartialEq)]
pub enum CallStatusField<'a> {
    /// The reply has no status field at all
    Absent,
    /// The field exists but holds nothing
    Null,
    /// The field exists but is not shaped like a status
    Invalid(String),
    Present(Cow<'a, CallStatus>),
}

impl<'a> CallStatusField<'a> {
    /// View an optional status field
    pub fn from_option(status: &'a Option<CallStatus>) -> Self {
        match status {
            Some(status) => CallStatusField::Present(Cow::Borrowed(status)),
            None => CallStatusField::Null,
        }
    }

    pub fn status(&self) -> Option<&CallStatus> {
        match self {
            CallStatusField::Present(status) => Some(status.as_ref()),
            _ => None,
        }
    }
}

/// Reply types that can carry a call status
///
/// The default reports no field; reply types built around a status override it.
pub trait HasCallStatus {
    fn call_status(&self) -> CallStatusField<'_> {
        CallStatusField::Absent
    }
}

impl HasCallStatus for CallStatus {
    fn call_status(&self) -> CallStatusField<'_> {
        CallStatusField::Present(Cow::Borrowed(self))
    }
}

impl HasCallStatus for serde_json::Value {
    fn call_status(&self) -> CallStatusField<'_> {
        let field = self
            .get(FIELD_NAME)
            .or_else(|| self.get(FIELD_NAME_PASCAL));

        match field {
            None => CallStatusField::Absent,
            Some(serde_json::Value::Null) => CallStatusField::Null,
            Some(value) => match CallStatus::deserialize(value) {
                Ok(status) => CallStatusField::Present(Cow::Owned(status)),
                Err(e) => CallStatusField::Invalid(e.to_string()),
            },
        }
    }
}

impl<T: HasCallStatus> HasCallStatus for Box<T> {
    fn call_status(&self) -> CallStatusField<'_> {
        (**self).call_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_present() {
        let reply = json!({
            "callStatus": {
                "code": 100001,
                "message": {"en": "Success."},
                "stack": [],
                "description": ""
            },
            "data": 1
        });
        let field = reply.call_status();
        assert_eq!(field.status().map(|s| s.code), Some(100001));
    }

    #[test]
    fn test_value_pascal_case_key() {
        let reply = json!({"CallStatus": {"code": 100002}});
        let status = reply.call_status().status().cloned().unwrap();
        assert_eq!(status.code, 100002);
        assert!(status.stack.is_empty());
    }

    #[test]
    fn test_value_absent_and_null() {
        assert_eq!(json!({"data": 1}).call_status(), CallStatusField::Absent);
        assert_eq!(json!({"callStatus": null}).call_status(), CallStatusField::Null);
        assert_eq!(json!([1, 2]).call_status(), CallStatusField::Absent);
    }

    #[test]
    fn test_value_invalid_shape() {
        let reply = json!({"callStatus": "ok"});
        let field = reply.call_status();
        assert!(matches!(field, CallStatusField::Invalid(_)));
    }

    #[test]
    fn test_struct_with_optional_status() {
        #[derive(Default)]
        struct Reply {
            call_status: Option<CallStatus>,
        }

        impl HasCallStatus for Reply {
            fn call_status(&self) -> CallStatusField<'_> {
                CallStatusField::from_option(&self.call_status)
            }
        }

        let mut reply = Reply::default();
        assert_eq!(reply.call_status(), CallStatusField::Null);
        reply.call_status = Some(CallStatus::default());
        assert!(reply.call_status().status().is_some());
    }
}

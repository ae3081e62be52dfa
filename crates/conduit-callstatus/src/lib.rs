//! Call status wire protocol
//!
//! A [`CallStatus`] is the serializable projection of a [`StackError`]. It is
//! embedded in every structured response so the caller can rebuild the
//! callee's error, history included.

mod field;
mod status;

pub use field::{CallStatusField, HasCallStatus, FIELD_NAME, FIELD_NAME_PASCAL};
pub use status::{from_error, from_result, to_error, CallStatus};

pub use conduit_error::StackError;

// Request and reply payloads

use std::fmt;

use bytes::Bytes;
use conduit_callstatus::{CallStatus, CallStatusField, HasCallStatus};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Body of an outgoing call
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Serialized as JSON
    Json(serde_json::Value),
    /// Sent as is
    Raw(Bytes),
}

impl RequestBody {
    /// Serialize any value into a JSON body
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(RequestBody::Json(serde_json::to_value(value)?))
    }

    pub fn raw(bytes: impl Into<Bytes>) -> Self {
        RequestBody::Raw(bytes.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RequestBody::Empty)
    }

    /// Wire bytes, `None` for an empty body
    pub fn to_bytes(&self) -> Result<Option<Bytes>, serde_json::Error> {
        match self {
            RequestBody::Empty => Ok(None),
            RequestBody::Json(value) => Ok(Some(Bytes::from(serde_json::to_vec(value)?))),
            RequestBody::Raw(bytes) => Ok(Some(bytes.clone())),
        }
    }
}

/// A value a response body can be decoded into
pub trait Reply: HasCallStatus + fmt::Debug + Send {
    fn decode(&mut self, body: &[u8]) -> Result<(), serde_json::Error>;
}

impl<T> Reply for T
where
    T: DeserializeOwned + HasCallStatus + fmt::Debug + Send,
{
    fn decode(&mut self, body: &[u8]) -> Result<(), serde_json::Error> {
        *self = serde_json::from_slice(body)?;
        Ok(())
    }
}

/// The common reply shape: a call status next to the payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(rename = "callStatus", default)]
    pub call_status: Option<CallStatus>,
    #[serde(default)]
    pub data: Option<T>,
}

impl<T> HasCallStatus for Envelope<T> {
    fn call_status(&self) -> CallStatusField<'_> {
        CallStatusField::from_option(&self.call_status)
    }
}

// Request builder
// Fluent construction of a single call

use std::time::Duration;

use bytes::Bytes;
use conduit_error::{codes, StackError};
use serde::Serialize;

use crate::chain::{InvokeError, InvokeResult};
use crate::client::Client;
use crate::context::CallContext;
use crate::options::{CallOption, CallOptions, Query};
use crate::reply::{Reply, RequestBody};

/// One call being assembled
///
/// Encoding failures are held until the request is sent.
#[derive(Debug)]
pub struct Request<'c> {
    client: &'c Client,
    method: String,
    target: String,
    body: RequestBody,
    options: CallOptions,
    error: Option<StackError>,
}

impl Client {
    pub fn request(&self, method: impl Into<String>, target: impl Into<String>) -> Request<'_> {
        Request {
            client: self,
            method: method.into(),
            target: target.into(),
            body: RequestBody::Empty,
            options: CallOptions::new(),
            error: None,
        }
    }

    pub fn get(&self, target: impl Into<String>) -> Request<'_> {
        self.request("GET", target)
    }

    pub fn post(&self, target: impl Into<String>) -> Request<'_> {
        self.request("POST", target)
    }

    pub fn put(&self, target: impl Into<String>) -> Request<'_> {
        self.request("PUT", target)
    }

    pub fn delete(&self, target: impl Into<String>) -> Request<'_> {
        self.request("DELETE", target)
    }
}

impl<'c> Request<'c> {
    /// JSON body
    #[track_caller]
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Self {
        match RequestBody::json(body) {
            Ok(body) => self.body = body,
            Err(e) => {
                self.fail(StackError::wrap_error(self.client.codes(), codes::ENCODING_JSON, e))
            }
        }
        self
    }

    /// Body sent without encoding
    pub fn raw(mut self, body: impl Into<Bytes>) -> Self {
        self.body = RequestBody::raw(body);
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options = self.options.set_header(key, value);
        self
    }

    pub fn add_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options = self.options.add_header(key, value);
        self
    }

    pub fn query_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options = self.options.query_value(key, value);
        self
    }

    /// Query parameters from any value that serializes to a flat object
    #[track_caller]
    pub fn query<T: Serialize + ?Sized>(mut self, query: &T) -> Self {
        let value = match serde_json::to_value(query) {
            Ok(value) => value,
            Err(e) => {
                let err = StackError::wrap_error(self.client.codes(), codes::ENCODING_JSON, e);
                self.fail(err);
                return self;
            }
        };

        let serde_json::Value::Object(fields) = value else {
            let err = StackError::wrap(
                self.client.codes(),
                codes::ENCODING_JSON,
                "query must serialize to an object",
            );
            self.fail(err);
            return self;
        };

        let mut params = Query::new();
        for (key, value) in fields {
            match value {
                serde_json::Value::Null => {}
                serde_json::Value::String(s) => params.insert(&key, s),
                serde_json::Value::Array(items) => {
                    params.set(&key, items.iter().map(scalar));
                }
                other => params.insert(&key, scalar(&other)),
            }
        }
        self.options = self.options.merge_query(params);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options = self.options.timeout(timeout);
        self
    }

    pub fn option(mut self, option: CallOption) -> Self {
        self.options = self.options.push(option);
        self
    }

    fn fail(&mut self, err: StackError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// Send, decoding into `reply` when given
    pub async fn send(self, ctx: &CallContext, reply: Option<&mut dyn Reply>) -> InvokeResult {
        if let Some(err) = self.error {
            return Err(InvokeError::new(err));
        }
        self.client
            .invoke(ctx, &self.method, &self.target, &self.body, reply, self.options.build())
            .await
    }

    /// Send and decode the reply into a fresh `R`
    pub async fn fetch<R: Reply + Default>(self, ctx: &CallContext) -> Result<R, InvokeError> {
        let mut reply = R::default();
        self.send(ctx, Some(&mut reply)).await?;
        Ok(reply)
    }
}

fn scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::CallInfo;
    use serde_json::json;

    fn client() -> Client {
        Client::builder("http://orders").build().unwrap()
    }

    #[derive(Serialize)]
    struct Page {
        page: u32,
        sort: &'static str,
        ids: Vec<u32>,
        cursor: Option<String>,
    }

    #[test]
    fn test_query_from_struct() {
        let client = client();
        let request = client.get("/v1/orders").query(&Page {
            page: 2,
            sort: "asc",
            ids: vec![1, 2],
            cursor: None,
        });

        let info = CallInfo::from_options(request.options.as_slice());
        assert_eq!(info.query.get("page"), Some("2"));
        assert_eq!(info.query.get("sort"), Some("asc"));
        assert_eq!(info.query.get_all("ids"), ["1".to_string(), "2".to_string()]);
        assert!(!info.query.contains("cursor"));
        assert!(request.error.is_none());
    }

    #[test]
    fn test_query_must_be_an_object() {
        let client = client();
        let request = client.get("/").query(&json!([1, 2]));
        assert_eq!(request.error.map(|e| e.code()), Some(codes::ENCODING_JSON));
    }

    #[test]
    fn test_headers_and_body() {
        let client = client();
        let request = client
            .post("/v1/orders")
            .header("X-Tenant", "acme")
            .add_header("Accept", "application/json")
            .json(&json!({"sku": 1}));

        let info = CallInfo::from_options(request.options.as_slice());
        assert_eq!(info.headers.get("x-tenant"), Some("acme"));
        assert_eq!(request.body, RequestBody::Json(json!({"sku": 1})));
        assert_eq!(request.method, "POST");
    }
}

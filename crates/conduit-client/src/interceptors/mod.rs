//! Built-in interceptors
//!
//! Each module exposes `build(skippers)` producing a ready interceptor.

use std::sync::Arc;

use crate::chain::Interceptor;
use crate::registry::InterceptorFactory;
use crate::skipper::Skipper;

pub mod callstatus;
pub mod context;
pub mod logging;
pub mod mtls;
pub mod recovery;
pub mod requestid;
pub mod statuscode;

pub const LOGGING: &str = "logging";
pub const CALL_STATUS: &str = "callstatus";
pub const STATUS_CODE: &str = "statuscode";
pub const MTLS: &str = "mtls";
pub const RECOVERY: &str = "recovery";
pub const REQUEST_ID: &str = "requestid";
pub const CONTEXT: &str = "context";

/// Header carrying the request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Every built-in interceptor with its registry name
pub fn builtin() -> Vec<(&'static str, InterceptorFactory)> {
    vec![
        (LOGGING, factory(logging::build)),
        (CALL_STATUS, factory(callstatus::build)),
        (STATUS_CODE, factory(statuscode::build)),
        (MTLS, factory(mtls::build)),
        (RECOVERY, factory(recovery::build)),
        (REQUEST_ID, factory(requestid::build)),
        (CONTEXT, factory(context::build)),
    ]
}

fn factory(build: fn(&[Skipper]) -> Arc<dyn Interceptor>) -> InterceptorFactory {
    Arc::new(build)
}

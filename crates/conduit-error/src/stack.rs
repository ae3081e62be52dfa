// Stack error
// A coded error with an append-only history of the boundaries it crossed

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use serde_json::json;

use crate::coder::{Coder, CoderRegistry, LOCALE_EN};
use crate::frame::{CallSite, StackFrame};
use crate::BoxError;

/// A coded error carrying its call-site history
///
/// Frames are only ever appended. The first frame is where the error was
/// created, the last is the most recent boundary it crossed.
#[derive(Debug, Clone)]
pub struct StackError {
    coder: Arc<Coder>,
    description: String,
    stack: Vec<String>,
}

impl StackError {
    /// Create an error with a single frame at the caller
    #[track_caller]
    pub fn wrap(registry: &CoderRegistry, code: i64, description: impl Into<String>) -> Self {
        Self::wrap_at(registry, CallSite::caller(), code, description)
    }

    pub fn wrap_at(
        registry: &CoderRegistry,
        site: CallSite,
        code: i64,
        description: impl Into<String>,
    ) -> Self {
        let coder = registry.lookup(code);
        let frame = StackFrame::capture(registry.module(), coder.code(), &site);
        Self {
            coder,
            description: description.into(),
            stack: vec![frame.to_string()],
        }
    }

    /// Wrap another error under `code`
    ///
    /// A [`StackError`] keeps its description and history and gains one frame.
    /// Anything else contributes its message as the description of a fresh
    /// single-frame stack.
    #[track_caller]
    pub fn wrap_error(registry: &CoderRegistry, code: i64, inner: impl Into<BoxError>) -> Self {
        Self::wrap_error_at(registry, CallSite::caller(), code, inner)
    }

    pub fn wrap_error_at(
        registry: &CoderRegistry,
        site: CallSite,
        code: i64,
        inner: impl Into<BoxError>,
    ) -> Self {
        match inner.into().downcast::<StackError>() {
            Ok(inner) => {
                let mut err = StackError {
                    coder: registry.lookup(code),
                    description: inner.description,
                    stack: inner.stack,
                };
                err.push_frame_at(registry, site);
                err
            }
            Err(other) => Self::wrap_at(registry, site, code, other.to_string()),
        }
    }

    /// Rebuild an error from a transmitted stack without adding a frame
    pub fn wrap_stack(
        registry: &CoderRegistry,
        code: i64,
        description: impl Into<String>,
        stack: Vec<String>,
    ) -> Self {
        Self {
            coder: registry.lookup(code),
            description: description.into(),
            stack,
        }
    }

    /// Normalize any error and append one frame at the caller
    ///
    /// The code is kept; unrecognized errors become Unknown.
    #[track_caller]
    pub fn update_stack(registry: &CoderRegistry, err: impl Into<BoxError>) -> Self {
        Self::update_stack_at(registry, CallSite::caller(), err)
    }

    pub fn update_stack_at(
        registry: &CoderRegistry,
        site: CallSite,
        err: impl Into<BoxError>,
    ) -> Self {
        let mut err = Self::from_error(registry, err);
        err.push_frame_at(registry, site);
        err
    }

    /// Normalize any error into a [`StackError`] without touching its history
    pub fn from_error(registry: &CoderRegistry, err: impl Into<BoxError>) -> Self {
        match err.into().downcast::<StackError>() {
            Ok(err) => *err,
            Err(other) => StackError {
                coder: registry.unknown(),
                description: other.to_string(),
                stack: Vec::new(),
            },
        }
    }

    /// Normalize the error side of a result; `Ok` passes through untouched
    pub fn from_result<T, E>(
        registry: &CoderRegistry,
        result: Result<T, E>,
    ) -> Result<T, StackError>
    where
        E: Into<BoxError>,
    {
        result.map_err(|e| Self::from_error(registry, e))
    }

    /// Append a frame for the caller, keeping the code
    #[track_caller]
    pub fn push_frame(&mut self, registry: &CoderRegistry) {
        self.push_frame_at(registry, CallSite::caller());
    }

    pub fn push_frame_at(&mut self, registry: &CoderRegistry, site: CallSite) {
        let frame = StackFrame::capture(registry.module(), self.coder.code(), &site);
        self.stack.push(frame.to_string());
    }

    pub fn code(&self) -> i64 {
        self.coder.code()
    }

    pub fn is_code(&self, code: i64) -> bool {
        self.coder.code() == code
    }

    pub fn http_status(&self) -> u16 {
        self.coder.http_status()
    }

    /// Message in the given locale
    pub fn message(&self, locale: &str) -> &str {
        self.coder.message(locale)
    }

    pub fn messages(&self) -> &std::collections::HashMap<String, String> {
        self.coder.messages()
    }

    pub fn coder(&self) -> &Arc<Coder> {
        &self.coder
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn stack(&self) -> &[String] {
        &self.stack
    }

    pub fn frames(&self) -> Vec<StackFrame> {
        self.stack.iter().map(|s| StackFrame::parse(s)).collect()
    }

    /// Render the call chain, grouping consecutive frames by service
    pub fn detail(&self) -> String {
        let mut out = format!(
            "code: {}, message: {}, description: {}\ncall chain:",
            self.code(),
            self.message(LOCALE_EN),
            self.description
        );

        let mut previous: Option<StackFrame> = None;
        for frame in self.frames() {
            let same = previous.as_ref().map_or(false, |p| p.same_service(&frame));
            if !same {
                out.push_str(&format!(
                    "\n  [{}@{} pid {}]",
                    frame.module, frame.host, frame.pid
                ));
            }
            out.push_str(&format!(
                "\n    {}:{} {} (code {})",
                frame.file, frame.line, frame.function, frame.code
            ));
            previous = Some(frame);
        }
        out
    }

    /// Code, English message and description
    pub fn to_basic_json(&self) -> serde_json::Value {
        json!({
            "code": self.code(),
            "message": self.message(LOCALE_EN),
            "desc": self.description,
        })
    }

    /// The basic form with every message, the HTTP status and the stack
    pub fn to_detail_json(&self) -> serde_json::Value {
        json!({
            "code": self.code(),
            "http": self.http_status(),
            "message": self.messages(),
            "desc": self.description,
            "stack": self.stack,
        })
    }
}

impl fmt::Display for StackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.message(LOCALE_EN), self.description)
    }
}

impl StdError for StackError {}

//! Stack frames
//!
//! A frame records where an error crossed a boundary. Frames travel as one
//! comma separated string, `host:H,pid:P,module:M,code:C,file:F,func:FN,line:L`,
//! and are parsed back for diagnostics.

use std::fmt;
use std::panic::Location;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Identity of the running process, stamped into every frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub host: String,
    pub pid: u32,
    pub module: String,
}

impl ModuleInfo {
    /// Describe the current process under the given module name.
    ///
    /// The host is a best guess: `HOSTNAME` when the environment exports it
    /// (most shells set it without exporting), then `/etc/hostname`, then
    /// `localhost`. Services that need a reliable host in their frames
    /// should pass it with [`ModuleInfo::with_host`] at startup.
    pub fn new(module: impl Into<String>) -> Self {
        let host = resolve_host(
            std::env::var("HOSTNAME").ok(),
            std::fs::read_to_string("/etc/hostname").ok(),
        );

        Self {
            host,
            pid: std::process::id(),
            module: module.into(),
        }
    }

    /// Replace the detected host; an empty host is ignored
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        let host = host.into();
        if !host.trim().is_empty() {
            self.host = host.trim().to_string();
        }
        self
    }
}

fn resolve_host(env: Option<String>, file: Option<String>) -> String {
    [env, file]
        .into_iter()
        .flatten()
        .map(|h| h.trim().to_string())
        .find(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

impl Default for ModuleInfo {
    fn default() -> Self {
        let module = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "unknown".to_string());
        Self::new(module)
    }
}

/// A source location plus, when known, the enclosing function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub file: String,
    pub line: u32,
    pub function: String,
}

impl CallSite {
    pub fn new(file: impl Into<String>, line: u32, function: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            function: function.into(),
        }
    }

    /// The location of whoever called the current `#[track_caller]` function
    #[track_caller]
    pub fn caller() -> Self {
        Self::from_location(Location::caller())
    }

    pub fn from_location(location: &Location<'_>) -> Self {
        Self::new(location.file(), location.line(), "")
    }
}

/// One parsed stack entry
///
/// Fields stay strings: frames may come from other processes and are only
/// ever displayed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    pub host: String,
    pub pid: String,
    pub module: String,
    pub code: String,
    pub file: String,
    pub function: String,
    pub line: String,
}

impl StackFrame {
    /// Capture a frame for `code` at `site`
    pub fn capture(module: &ModuleInfo, code: i64, site: &CallSite) -> Self {
        Self {
            host: module.host.clone(),
            pid: module.pid.to_string(),
            module: module.module.clone(),
            code: code.to_string(),
            file: short_file(&site.file),
            function: trim_closure_suffix(&site.function).to_string(),
            line: site.line.to_string(),
        }
    }

    /// Parse the wire form, ignoring segments it does not know
    pub fn parse(raw: &str) -> Self {
        let mut frame = StackFrame::default();
        for segment in raw.split(',') {
            let Some((key, value)) = segment.split_once(':') else {
                continue;
            };
            let value = value.to_string();
            match key.trim() {
                "host" => frame.host = value,
                "pid" => frame.pid = value,
                "module" => frame.module = value,
                "code" => frame.code = value,
                "file" => frame.file = value,
                "func" => frame.function = value,
                "line" => frame.line = value,
                _ => {}
            }
        }
        frame
    }

    /// Whether this frame and `other` were produced by the same process
    pub fn same_service(&self, other: &StackFrame) -> bool {
        self.host == other.host && self.pid == other.pid && self.module == other.module
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "host:{},pid:{},module:{},code:{},file:{},func:{},line:{}",
            self.host, self.pid, self.module, self.code, self.file, self.function, self.line
        )
    }
}

// Keep the parent directory so frames stay readable without full paths
fn short_file(file: &str) -> String {
    let path = Path::new(file);
    let name = path.file_name().map(|n| n.to_string_lossy());
    let parent = path
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy());

    match (parent, name) {
        (Some(parent), Some(name)) => format!("{}/{}", parent, name),
        (None, Some(name)) => name.into_owned(),
        _ => file.to_string(),
    }
}

/// Strip closure markers from a function path
pub fn trim_closure_suffix(function: &str) -> &str {
    let mut function = function;
    while let Some(stripped) = function.strip_suffix("::{{closure}}") {
        function = stripped;
    }
    function
}

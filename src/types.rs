//! Portable, wire-neutral shapes shared by the DAP client, the state tracker
//! and the backend contract. Everything here serializes to the exact JSON the
//! adapter expects, but none of it knows about framing or transports.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// How a debug session is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RequestKind {
    Launch,
    Attach,
}

/// A launch/attach descriptor. `type`, `request` and `name` are required by
/// the contract; everything else is adapter specific and passes through the
/// flattened bag untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebugConfig {
    #[serde(rename = "type")]
    pub adapter_type: String,
    pub request: RequestKind,
    pub name: String,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, Value>,
}

impl DebugConfig {
    pub fn new(
        adapter_type: impl Into<String>,
        request: RequestKind,
        name: impl Into<String>,
    ) -> Self {
        DebugConfig {
            adapter_type: adapter_type.into(),
            request,
            name: name.into(),
            rest: serde_json::Map::new(),
        }
    }

    /// Set an adapter specific field, replacing any previous value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.rest.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.rest.get(key)
    }

    pub fn program(&self) -> Option<&str> {
        self.rest.get("program").and_then(Value::as_str)
    }

    pub fn cwd(&self) -> Option<&str> {
        self.rest.get("cwd").and_then(Value::as_str)
    }

    pub fn stop_on_entry(&self) -> bool {
        self.rest
            .get("stopOnEntry")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// A file-system path plus its normalized (forward-slash) form. No scheme
/// handling beyond the file case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Uri {
    path: PathBuf,
}

impl Uri {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Uri { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The path with every separator normalized to `/`.
    pub fn normalized(&self) -> String {
        self.path.to_string_lossy().replace('\\', "/")
    }

    pub fn file_name(&self) -> Option<String> {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }
}

impl From<&Path> for Uri {
    fn from(path: &Path) -> Self {
        Uri::file(path)
    }
}

/// A breakpoint in a source file, in the wire shape `setBreakpoints` expects.
/// Lines and columns are 1-based everywhere on the external contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceBreakpoint {
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_message: Option<String>,
}

impl SourceBreakpoint {
    pub fn at_line(line: u32) -> Self {
        SourceBreakpoint {
            line,
            column: None,
            condition: None,
            hit_condition: None,
            log_message: None,
        }
    }
}

/// A breakpoint on a function name, in the wire shape
/// `setFunctionBreakpoints` expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionBreakpoint {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_condition: Option<String>,
}

impl FunctionBreakpoint {
    pub fn named(name: impl Into<String>) -> Self {
        FunctionBreakpoint {
            name: name.into(),
            condition: None,
            hit_condition: None,
        }
    }
}

/// The portable breakpoint union the backend stores and reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Breakpoint {
    Source {
        path: PathBuf,
        breakpoint: SourceBreakpoint,
    },
    Function(FunctionBreakpoint),
}

/// Category of an adapter output event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutputCategory {
    #[default]
    Console,
    Stdout,
    Stderr,
    Telemetry,
}

/// Body of the adapter's `stopped` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StoppedEvent {
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_threads_stopped: Option<bool>,
}

/// Body of the adapter's `output` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputEvent {
    #[serde(default)]
    pub category: OutputCategory,
    pub output: String,
}

/// Body of the adapter's `terminated` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TerminatedEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<Value>,
}

/// One activation record of the debuggee call stack, as much of it as the
/// backend tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameInfo {
    pub id: i64,
    pub name: String,
    pub line: u32,
    pub column: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceRef>,
}

/// Source attribution of a stack frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadInfo {
    pub id: i64,
    pub name: String,
}

/// Phase of the single debug session the backend manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SessionState {
    #[default]
    Inactive,
    Initializing,
    Running,
    Stopped,
    Terminated,
}

/// One line of captured program output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRecord {
    pub text: String,
    pub category: OutputCategory,
    /// Milliseconds since the unix epoch.
    pub timestamp: u64,
}

/// Filter for [`OutputSnapshot`] retrieval.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputQuery {
    /// Only lines captured strictly after this timestamp (unix millis).
    pub since: Option<u64>,
    /// Keep at most this many lines, newest win.
    pub max_lines: Option<usize>,
}

/// Program output split by channel. `stdout` also carries `console` lines.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct OutputSnapshot {
    pub stdout: String,
    pub stderr: String,
    pub truncated: bool,
}

/// Synthesized snapshot of where the debuggee currently is.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugState {
    pub session_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_full_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_line_content: Option<String>,
    pub next_lines: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_name: Option<String>,
}

//! DAP message envelopes and the typed bodies for the protocol subset the
//! backend consumes. Adapter specific payloads stay as [`serde_json::Value`]
//! and round-trip untouched.

use crate::types::ThreadInfo;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outbound request envelope.
#[derive(Debug, Serialize)]
pub struct OutgoingRequest {
    pub seq: i64,
    #[serde(rename = "type")]
    pub r#type: &'static str,
    pub command: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub arguments: Value,
}

impl OutgoingRequest {
    pub fn new(seq: i64, command: impl Into<String>, arguments: Value) -> Self {
        OutgoingRequest {
            seq,
            r#type: "request",
            command: command.into(),
            arguments,
        }
    }
}

/// Any message the adapter can send us, discriminated by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Incoming {
    Response(Response),
    Event(Event),
    /// A reverse request (adapter → client). Exposed to subscribers; the core
    /// never answers them.
    Request(ReverseRequest),
}

/// Response envelope, matched to its request by `request_seq`.
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub seq: i64,
    pub request_seq: i64,
    pub success: bool,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub body: Option<Value>,
}

impl Response {
    pub fn take_body(self) -> Value {
        self.body.unwrap_or(Value::Null)
    }
}

/// Event envelope, keyed by `event` name.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub seq: i64,
    pub event: String,
    #[serde(default)]
    pub body: Option<Value>,
}

impl Event {
    /// Deserialize the body into a typed shape, `None` on absence/mismatch.
    pub fn body_as<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_value(self.body.clone().unwrap_or(Value::Null)).ok()
    }
}

/// Request envelope initiated by the adapter.
#[derive(Debug, Clone, Deserialize)]
pub struct ReverseRequest {
    #[serde(default)]
    pub seq: i64,
    pub command: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Adapter capabilities from the `initialize` response. Only the flags the
/// backend looks at are typed; the rest stays in the bag.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    #[serde(default)]
    pub supports_configuration_done_request: bool,
    #[serde(default)]
    pub supports_function_breakpoints: bool,
    #[serde(default)]
    pub supports_conditional_breakpoints: bool,
    #[serde(default)]
    pub supports_restart_request: bool,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadsResponseBody {
    #[serde(default)]
    pub threads: Vec<ThreadInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub line: u32,
    #[serde(default)]
    pub column: Option<u32>,
    #[serde(default)]
    pub source: Option<DapSource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DapSource {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceResponseBody {
    #[serde(default)]
    pub stack_frames: Vec<StackFrame>,
    #[serde(default)]
    pub total_frames: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub name: String,
    pub variables_reference: i64,
    #[serde(default)]
    pub expensive: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScopesResponseBody {
    #[serde(default)]
    pub scopes: Vec<Scope>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub value: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    #[serde(rename = "variablesReference", default)]
    pub variables_reference: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariablesResponseBody {
    #[serde(default)]
    pub variables: Vec<Variable>,
}

/// Result of `evaluate`, also the backend's expression-evaluation output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluateResponseBody {
    pub result: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    #[serde(rename = "variablesReference", default)]
    pub variables_reference: i64,
}

/// Body of the adapter's `exited` event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitedEventBody {
    #[serde(default)]
    pub exit_code: i64,
}

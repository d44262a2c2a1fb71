//! The backend contract and its standalone DAP implementation.
//!
//! Consumers program against the [`DebugBackend`] capability set (session
//! control, stepping, breakpoints, inspection, events); [`DapBackend`] is the
//! standalone variant that drives an external debug adapter. Editor-embedded
//! variants implement the same trait elsewhere.

pub mod breakpoint;
pub mod session;
pub mod supervisor;
pub mod tracker;

pub use session::{BackendOptions, BackendSubscription, DapBackend, ScopeVariables, VariablesByScope};
pub use supervisor::{AdapterEvent, AdapterSupervisor};
pub use tracker::StateTracker;

use crate::dap::protocol::EvaluateResponseBody;
use crate::error::Result;
use crate::types::{
    Breakpoint, DebugConfig, DebugState, FunctionBreakpoint, OutputQuery, OutputSnapshot,
    OutputEvent, StoppedEvent, TerminatedEvent, Uri,
};
use std::path::Path;

/// Which scopes [`DebugBackend::get_variables`] keeps. Scopes are matched by
/// case-insensitive name substring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum_macros::Display, strum_macros::EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum VariableScope {
    Local,
    Global,
    #[default]
    All,
}

/// The transport-free backend contract. All operations act on the single
/// active session; the optional session id is informational and mismatches
/// are treated as "no such session".
pub trait DebugBackend: Send + Sync {
    // --------------------------------- session lifecycle -----------------------------------------
    fn start_debugging(&self, working_dir: &Path, config: DebugConfig) -> Result<()>;
    fn stop_debugging(&self, session: Option<&str>) -> Result<()>;
    fn restart(&self, session: Option<&str>) -> Result<()>;
    fn has_active_session(&self) -> bool;
    fn session_id(&self) -> Option<String>;

    // --------------------------------- stepping --------------------------------------------------
    fn step_over(&self, session: Option<&str>) -> Result<()>;
    fn step_into(&self, session: Option<&str>) -> Result<()>;
    fn step_out(&self, session: Option<&str>) -> Result<()>;
    fn continue_execution(&self, session: Option<&str>) -> Result<()>;
    fn pause(&self, session: Option<&str>) -> Result<()>;

    // --------------------------------- breakpoints -----------------------------------------------
    fn add_breakpoint(&self, uri: &Uri, line: u32) -> Result<()>;
    fn remove_breakpoint(&self, uri: &Uri, line: u32) -> Result<()>;
    fn add_function_breakpoint(&self, breakpoint: FunctionBreakpoint) -> Result<()>;
    fn remove_function_breakpoint(&self, name: &str) -> Result<()>;
    fn get_breakpoints(&self) -> Vec<Breakpoint>;
    fn clear_all_breakpoints(&self) -> Result<()>;

    // --------------------------------- inspection ------------------------------------------------
    fn get_active_frame_id(&self, session: Option<&str>) -> Option<i64>;
    fn get_current_debug_state(
        &self,
        session: Option<&str>,
        num_next_lines: usize,
    ) -> Result<DebugState>;
    fn get_variables(
        &self,
        session: Option<&str>,
        frame_id: i64,
        scope: VariableScope,
    ) -> Result<VariablesByScope>;
    fn evaluate_expression(
        &self,
        session: Option<&str>,
        expression: &str,
        frame_id: Option<i64>,
    ) -> Result<EvaluateResponseBody>;
    fn get_recent_output(&self, query: OutputQuery) -> OutputSnapshot;

    // --------------------------------- events ----------------------------------------------------
    fn on_stopped(&self, callback: Box<dyn Fn(&StoppedEvent) + Send + Sync>)
    -> BackendSubscription;
    fn on_terminated(
        &self,
        callback: Box<dyn Fn(&TerminatedEvent) + Send + Sync>,
    ) -> BackendSubscription;
    fn on_output(&self, callback: Box<dyn Fn(&OutputEvent) + Send + Sync>) -> BackendSubscription;

    /// Tear everything down. Idempotent.
    fn dispose(&self);
}

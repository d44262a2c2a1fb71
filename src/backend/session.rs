//! The standalone DAP backend orchestrator.
//!
//! `DapBackend` composes the supervisor, the DAP client, the state tracker
//! and the breakpoint store into the backend contract. Adapter events flow
//! through a per-session pump thread that updates the tracker first and only
//! then notifies subscribers, so a subscriber always observes the state its
//! event caused.

use crate::backend::breakpoint::BreakpointStore;
use crate::backend::supervisor::{AdapterEvent, AdapterSupervisor};
use crate::backend::tracker::{DEFAULT_MAX_OUTPUT_LINES, StateTracker, now_millis};
use crate::backend::{DebugBackend, VariableScope};
use crate::cfg::{AdapterDescriptor, StandaloneConfig};
use crate::dap::client::{ClientNotification, DapClient, Subscription};
use crate::dap::protocol::{EvaluateResponseBody, Event, ExitedEventBody, Variable};
use crate::error::{Error, Result};
use crate::types::{
    Breakpoint, DebugConfig, DebugState, FrameInfo, FunctionBreakpoint, OutputEvent, OutputQuery,
    OutputSnapshot, RequestKind, SessionState, SourceBreakpoint, SourceRef, StoppedEvent,
    TerminatedEvent, Uri,
};
use indexmap::IndexMap;
use serde_json::{Value, json};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::Duration;
use uuid::Uuid;

/// Variables of one scope, or the error that scope produced.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ScopeVariables {
    pub variables: Vec<Variable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `scope name → variables` in adapter order.
pub type VariablesByScope = IndexMap<String, ScopeVariables>;

#[derive(Debug, Clone, Copy)]
pub struct BackendOptions {
    /// How long to wait for the adapter's `initialized` event.
    pub init_timeout: Duration,
    /// Default per-request DAP timeout.
    pub request_timeout: Duration,
    /// Output ring buffer capacity in lines.
    pub max_output_lines: usize,
}

impl Default for BackendOptions {
    fn default() -> Self {
        BackendOptions {
            init_timeout: Duration::from_secs(10),
            request_timeout: crate::dap::client::DEFAULT_REQUEST_TIMEOUT,
            max_output_lines: DEFAULT_MAX_OUTPUT_LINES,
        }
    }
}

type StoppedCallback = Arc<dyn Fn(&StoppedEvent) + Send + Sync>;
type TerminatedCallback = Arc<dyn Fn(&TerminatedEvent) + Send + Sync>;
type OutputCallback = Arc<dyn Fn(&OutputEvent) + Send + Sync>;

#[derive(Default)]
struct SubscriberSet {
    next_id: AtomicU64,
    stopped: Mutex<Vec<(u64, StoppedCallback)>>,
    terminated: Mutex<Vec<(u64, TerminatedCallback)>>,
    output: Mutex<Vec<(u64, OutputCallback)>>,
}

impl SubscriberSet {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn remove(&self, id: u64) {
        self.stopped.lock().unwrap().retain(|(sub, _)| *sub != id);
        self.terminated.lock().unwrap().retain(|(sub, _)| *sub != id);
        self.output.lock().unwrap().retain(|(sub, _)| *sub != id);
    }

    fn notify_stopped(&self, event: &StoppedEvent) {
        let callbacks: Vec<StoppedCallback> = {
            let subs = self.stopped.lock().unwrap();
            subs.iter().map(|(_, cb)| cb.clone()).collect()
        };
        for callback in callbacks {
            suppress_panic("stopped", || callback(event));
        }
    }

    fn notify_terminated(&self, event: &TerminatedEvent) {
        let callbacks: Vec<TerminatedCallback> = {
            let subs = self.terminated.lock().unwrap();
            subs.iter().map(|(_, cb)| cb.clone()).collect()
        };
        for callback in callbacks {
            suppress_panic("terminated", || callback(event));
        }
    }

    fn notify_output(&self, event: &OutputEvent) {
        let callbacks: Vec<OutputCallback> = {
            let subs = self.output.lock().unwrap();
            subs.iter().map(|(_, cb)| cb.clone()).collect()
        };
        for callback in callbacks {
            suppress_panic("output", || callback(event));
        }
    }
}

/// A throwing subscriber never prevents the others from hearing the event.
fn suppress_panic(kind: &str, callback: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(callback)).is_err() {
        log::error!(target: "backend", "{kind} subscriber panicked; continuing");
    }
}

/// Handle that removes one backend subscription when disposed.
pub struct BackendSubscription {
    set: Weak<SubscriberSet>,
    id: u64,
}

impl BackendSubscription {
    pub fn dispose(self) {
        if let Some(set) = self.set.upgrade() {
            set.remove(self.id);
        }
    }
}

struct SessionHandle {
    id: String,
    client: Arc<DapClient>,
    subscriptions: Vec<Subscription>,
}

enum PumpMessage {
    Event(Event),
    ClientClosed,
}

pub struct DapBackend {
    supervisor: Arc<AdapterSupervisor>,
    tracker: Arc<Mutex<StateTracker>>,
    breakpoints: Mutex<BreakpointStore>,
    session: Mutex<Option<SessionHandle>>,
    remembered: Mutex<Option<(DebugConfig, PathBuf)>>,
    subscribers: Arc<SubscriberSet>,
    init_timeout: Duration,
}

impl DapBackend {
    pub fn new(adapters: IndexMap<String, AdapterDescriptor>) -> Self {
        Self::with_options(adapters, BackendOptions::default())
    }

    pub fn from_config(config: &StandaloneConfig) -> Self {
        Self::new(config.adapters.clone())
    }

    pub fn with_options(
        adapters: IndexMap<String, AdapterDescriptor>,
        options: BackendOptions,
    ) -> Self {
        let supervisor = Arc::new(AdapterSupervisor::with_request_timeout(
            adapters,
            options.request_timeout,
        ));
        let tracker = Arc::new(Mutex::new(StateTracker::new(options.max_output_lines)));
        let subscribers = Arc::new(SubscriberSet::default());

        // Adapter death drives the session to `terminated` even when no DAP
        // `terminated` event made it through.
        supervisor.set_event_hook({
            let tracker = Arc::clone(&tracker);
            let subscribers = Arc::clone(&subscribers);
            move |event| match event {
                AdapterEvent::Exited { adapter, code, signal } => {
                    log::info!(
                        target: "backend",
                        "adapter `{adapter}` exited (code {code:?}, signal {signal:?})"
                    );
                    let transitioned = tracker.lock().unwrap().on_terminated();
                    if transitioned {
                        subscribers.notify_terminated(&TerminatedEvent::default());
                    }
                }
                AdapterEvent::Crashed { adapter, code, signal } => {
                    log::error!(
                        target: "backend",
                        "adapter `{adapter}` crashed (code {code:?}, signal {signal:?})"
                    );
                }
            }
        });

        DapBackend {
            supervisor,
            tracker,
            breakpoints: Mutex::new(BreakpointStore::default()),
            session: Mutex::new(None),
            remembered: Mutex::new(None),
            subscribers,
            init_timeout: options.init_timeout,
        }
    }

    // --------------------------------- internals -------------------------------------------------

    fn check_session(&self, session: Option<&str>) -> Result<()> {
        let Some(requested) = session else {
            return Ok(());
        };
        let matches = self
            .session
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|handle| handle.id == requested);
        if matches {
            Ok(())
        } else {
            Err(Error::NoSuchSession(requested.to_string()))
        }
    }

    fn active_client(&self, session: Option<&str>) -> Result<Arc<DapClient>> {
        self.check_session(session)?;
        if !self.has_active_session() {
            return Err(Error::NoActiveSession);
        }
        self.session
            .lock()
            .unwrap()
            .as_ref()
            .map(|handle| Arc::clone(&handle.client))
            .ok_or(Error::NoActiveSession)
    }

    /// First-thread policy: reuse the tracked thread, otherwise ask the
    /// adapter and record the first thread it reports.
    fn ensure_thread_id(&self, client: &DapClient) -> Result<i64> {
        if let Some(thread_id) = self.tracker.lock().unwrap().current_thread_id() {
            return Ok(thread_id);
        }
        let threads = client.threads()?;
        let Some(first) = threads.first() else {
            return Err(Error::NoThreadsAvailable);
        };
        let thread_id = first.id;
        let mut tracker = self.tracker.lock().unwrap();
        tracker.set_current_thread(thread_id);
        tracker.set_threads(threads);
        Ok(thread_id)
    }

    fn step(&self, session: Option<&str>, command: StepCommand) -> Result<()> {
        let client = self.active_client(session)?;
        let thread_id = self.ensure_thread_id(&client)?;
        self.tracker.lock().unwrap().on_continued();
        match command {
            StepCommand::Next => client.next(thread_id)?,
            StepCommand::StepIn => client.step_in(thread_id)?,
            StepCommand::StepOut => client.step_out(thread_id)?,
            StepCommand::Continue => client.continue_execution(thread_id)?,
        };
        Ok(())
    }

    fn launch_session(&self, working_dir: &Path, config: &DebugConfig) -> Result<SessionHandle> {
        let client = self.supervisor.start(&config.adapter_type)?;
        self.supervisor.initialize()?;

        // Pump wiring and the `initialized` waiter both come before launch:
        // several adapters emit `initialized` before the launch response.
        let (pump_tx, pump_rx) = mpsc::channel::<PumpMessage>();
        let event_sub = client.on_event({
            let tx = pump_tx.clone();
            move |event| {
                let _ = tx.send(PumpMessage::Event(event.clone()));
            }
        });
        let closed_sub = client.on_notification({
            let tx = pump_tx;
            move |notification| {
                if matches!(notification, ClientNotification::Closed) {
                    let _ = tx.send(PumpMessage::ClientClosed);
                }
            }
        });
        self.spawn_event_pump(Arc::clone(&client), pump_rx);
        let initialized = client.event_waiter("initialized");

        let mut arguments = serde_json::to_value(config)?;
        if config.request == RequestKind::Launch
            && let Value::Object(map) = &mut arguments
        {
            map.insert("cwd".to_string(), json!(working_dir));
        }

        // Fire and observe: the launch outcome is implied by the rest of the
        // handshake; failures surface in the log.
        let request = match config.request {
            RequestKind::Launch => "launch",
            RequestKind::Attach => "attach",
        };
        thread::Builder::new()
            .name("dap-launch".to_string())
            .spawn({
                let client = Arc::clone(&client);
                move || {
                    if let Err(err) = client.request(request, arguments) {
                        log::error!(target: "backend", "{request} failed: {err}");
                    }
                }
            })
            .expect("spawn launch thread");

        if initialized.wait(self.init_timeout).is_none() {
            return Err(Error::InitializationTimeout(self.init_timeout));
        }

        self.sync_all_breakpoints(&client)?;
        client.configuration_done()?;

        Ok(SessionHandle {
            id: Uuid::new_v4().to_string(),
            client,
            subscriptions: vec![event_sub, closed_sub],
        })
    }

    fn spawn_event_pump(&self, client: Arc<DapClient>, rx: Receiver<PumpMessage>) {
        let tracker = Arc::clone(&self.tracker);
        let subscribers = Arc::clone(&self.subscribers);
        thread::Builder::new()
            .name("backend-events".to_string())
            .spawn(move || {
                for message in rx {
                    match message {
                        PumpMessage::ClientClosed => break,
                        PumpMessage::Event(event) => {
                            handle_adapter_event(&client, &tracker, &subscribers, &event)
                        }
                    }
                }
                log::debug!(target: "backend", "event pump finished");
            })
            .expect("spawn backend event pump");
    }

    /// Initial sync: the complete set for every known path (and the function
    /// list, when present), after `initialized` and before
    /// `configurationDone`.
    fn sync_all_breakpoints(&self, client: &DapClient) -> Result<()> {
        let (paths, functions) = {
            let store = self.breakpoints.lock().unwrap();
            (store.paths(), store.function_set())
        };
        for path in paths {
            let set = self.breakpoints.lock().unwrap().source_set(&path);
            client.set_breakpoints(&path, &set)?;
        }
        if !functions.is_empty() {
            client.set_function_breakpoints(&functions)?;
        }
        Ok(())
    }

    /// Total reconciliation for one path: the adapter hears the full current
    /// set, which is empty when the path just lost its last breakpoint.
    fn reconcile_path(&self, path: &Path) -> Result<()> {
        if !self.has_active_session() {
            return Ok(());
        }
        let Ok(client) = self.active_client(None) else {
            return Ok(());
        };
        let set = self.breakpoints.lock().unwrap().source_set(path);
        client.set_breakpoints(path, &set)?;
        Ok(())
    }

    fn reconcile_functions(&self) -> Result<()> {
        if !self.has_active_session() {
            return Ok(());
        }
        let Ok(client) = self.active_client(None) else {
            return Ok(());
        };
        let set = self.breakpoints.lock().unwrap().function_set();
        client.set_function_breakpoints(&set)?;
        Ok(())
    }

    fn stop_session_internal(&self) {
        if let Some(handle) = self.session.lock().unwrap().take() {
            log::info!(target: "backend", "stopping session {}", handle.id);
            for subscription in handle.subscriptions {
                subscription.dispose();
            }
        }
        self.supervisor.stop();
        *self.remembered.lock().unwrap() = None;
        self.tracker.lock().unwrap().mark_inactive();
    }
}

#[derive(Clone, Copy)]
enum StepCommand {
    Next,
    StepIn,
    StepOut,
    Continue,
}

impl DebugBackend for DapBackend {
    fn start_debugging(&self, working_dir: &Path, config: DebugConfig) -> Result<()> {
        // A previous session may linger in any form: a live adapter, a stale
        // handle after an adapter died on its own, or a half-torn state.
        if self.supervisor.has_active() || self.session.lock().unwrap().is_some() {
            self.stop_session_internal();
        }
        self.tracker.lock().unwrap().begin_initializing();

        match self.launch_session(working_dir, &config) {
            Ok(handle) => {
                log::info!(
                    target: "backend",
                    "session {} started ({} `{}`)",
                    handle.id,
                    config.request,
                    config.name
                );
                *self.session.lock().unwrap() = Some(handle);
                *self.remembered.lock().unwrap() =
                    Some((config, working_dir.to_path_buf()));
                self.tracker.lock().unwrap().mark_running();
                Ok(())
            }
            Err(err) => {
                self.tracker.lock().unwrap().on_terminated();
                self.supervisor.stop();
                Err(err)
            }
        }
    }

    fn stop_debugging(&self, session: Option<&str>) -> Result<()> {
        self.check_session(session)?;
        self.stop_session_internal();
        Ok(())
    }

    fn restart(&self, session: Option<&str>) -> Result<()> {
        self.check_session(session)?;
        let Some((config, working_dir)) = self.remembered.lock().unwrap().clone() else {
            return Err(Error::NothingToRestart);
        };
        if let Ok(client) = self.active_client(None) {
            let _ = client.request_with_timeout(
                "disconnect",
                json!({"restart": true}),
                Duration::from_secs(2),
            );
        }
        self.start_debugging(&working_dir, config)
    }

    fn has_active_session(&self) -> bool {
        self.supervisor.has_active()
            && !matches!(
                self.tracker.lock().unwrap().state(),
                SessionState::Inactive | SessionState::Terminated
            )
    }

    fn session_id(&self) -> Option<String> {
        self.session
            .lock()
            .unwrap()
            .as_ref()
            .map(|handle| handle.id.clone())
    }

    fn step_over(&self, session: Option<&str>) -> Result<()> {
        self.step(session, StepCommand::Next)
    }

    fn step_into(&self, session: Option<&str>) -> Result<()> {
        self.step(session, StepCommand::StepIn)
    }

    fn step_out(&self, session: Option<&str>) -> Result<()> {
        self.step(session, StepCommand::StepOut)
    }

    fn continue_execution(&self, session: Option<&str>) -> Result<()> {
        self.step(session, StepCommand::Continue)
    }

    fn pause(&self, session: Option<&str>) -> Result<()> {
        let client = self.active_client(session)?;
        let thread_id = self.ensure_thread_id(&client)?;
        client.pause(thread_id)?;
        Ok(())
    }

    fn add_breakpoint(&self, uri: &Uri, line: u32) -> Result<()> {
        let changed = self
            .breakpoints
            .lock()
            .unwrap()
            .add_source(uri.path(), SourceBreakpoint::at_line(line));
        if changed {
            self.reconcile_path(uri.path())?;
        }
        Ok(())
    }

    fn remove_breakpoint(&self, uri: &Uri, line: u32) -> Result<()> {
        let changed = self.breakpoints.lock().unwrap().remove_source(uri.path(), line);
        if changed {
            self.reconcile_path(uri.path())?;
        }
        Ok(())
    }

    fn add_function_breakpoint(&self, breakpoint: FunctionBreakpoint) -> Result<()> {
        let changed = self.breakpoints.lock().unwrap().add_function(breakpoint);
        if changed {
            self.reconcile_functions()?;
        }
        Ok(())
    }

    fn remove_function_breakpoint(&self, name: &str) -> Result<()> {
        let changed = self.breakpoints.lock().unwrap().remove_function(name);
        if changed {
            self.reconcile_functions()?;
        }
        Ok(())
    }

    fn get_breakpoints(&self) -> Vec<Breakpoint> {
        self.breakpoints.lock().unwrap().all()
    }

    fn clear_all_breakpoints(&self) -> Result<()> {
        let (paths, had_functions) = {
            let mut store = self.breakpoints.lock().unwrap();
            let had_functions = store.has_functions();
            (store.clear(), had_functions)
        };
        if paths.is_empty() && !had_functions {
            return Ok(());
        }
        if self.has_active_session()
            && let Ok(client) = self.active_client(None)
        {
            for path in &paths {
                client.set_breakpoints(path, &[])?;
            }
            if had_functions {
                client.set_function_breakpoints(&[])?;
            }
        }
        Ok(())
    }

    fn get_active_frame_id(&self, session: Option<&str>) -> Option<i64> {
        if self.check_session(session).is_err() {
            return None;
        }
        self.tracker.lock().unwrap().current_frame_id()
    }

    fn get_current_debug_state(
        &self,
        session: Option<&str>,
        num_next_lines: usize,
    ) -> Result<DebugState> {
        self.check_session(session)?;
        if !self.has_active_session() {
            return Ok(DebugState::default());
        }

        let (thread_id, frame_id, frame) = {
            let tracker = self.tracker.lock().unwrap();
            (
                tracker.current_thread_id(),
                tracker.current_frame_id(),
                tracker.current_frame().cloned(),
            )
        };

        let mut state = DebugState {
            session_active: true,
            thread_id,
            frame_id,
            frame_name: frame.as_ref().map(|frame| frame.name.clone()),
            ..DebugState::default()
        };

        let Some(frame) = frame else {
            return Ok(state);
        };
        state.current_line = Some(frame.line);

        let Some(path) = frame.source.as_ref().and_then(|source| source.path.clone()) else {
            return Ok(state);
        };
        state.file_name = Path::new(&path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        state.file_full_path = Some(path.clone());

        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let lines: Vec<&str> = content.lines().collect();
                let index = frame.line.saturating_sub(1) as usize;
                state.current_line_content = lines.get(index).map(|line| (*line).to_string());
                state.next_lines = lines
                    .iter()
                    .skip(index + 1)
                    .take(num_next_lines)
                    .map(|line| (*line).to_string())
                    .collect();
            }
            Err(err) => {
                // The excerpt is best effort; ids and location survive.
                log::warn!(target: "backend", "cannot read source {path}: {err}");
            }
        }
        Ok(state)
    }

    fn get_variables(
        &self,
        session: Option<&str>,
        frame_id: i64,
        scope: VariableScope,
    ) -> Result<VariablesByScope> {
        let client = self.active_client(session)?;
        let scopes = client.scopes(frame_id)?;

        let mut result = VariablesByScope::new();
        for entry in scopes.scopes {
            let name = entry.name.to_lowercase();
            let keep = match scope {
                VariableScope::All => true,
                VariableScope::Local => name.contains("local"),
                VariableScope::Global => name.contains("global"),
            };
            if !keep {
                continue;
            }
            let variables = match client.variables(entry.variables_reference) {
                Ok(body) => ScopeVariables {
                    variables: body.variables,
                    error: None,
                },
                Err(err) => ScopeVariables {
                    variables: Vec::new(),
                    error: Some(err.to_string()),
                },
            };
            result.insert(entry.name, variables);
        }
        Ok(result)
    }

    fn evaluate_expression(
        &self,
        session: Option<&str>,
        expression: &str,
        frame_id: Option<i64>,
    ) -> Result<EvaluateResponseBody> {
        let client = self.active_client(session)?;
        let frame_id = frame_id.or_else(|| self.tracker.lock().unwrap().current_frame_id());
        client.evaluate(expression, frame_id, "repl")
    }

    fn get_recent_output(&self, query: OutputQuery) -> OutputSnapshot {
        self.tracker.lock().unwrap().query_output(query)
    }

    fn on_stopped(
        &self,
        callback: Box<dyn Fn(&StoppedEvent) + Send + Sync>,
    ) -> BackendSubscription {
        let id = self.subscribers.next_id();
        self.subscribers
            .stopped
            .lock()
            .unwrap()
            .push((id, Arc::from(callback)));
        BackendSubscription {
            set: Arc::downgrade(&self.subscribers),
            id,
        }
    }

    fn on_terminated(
        &self,
        callback: Box<dyn Fn(&TerminatedEvent) + Send + Sync>,
    ) -> BackendSubscription {
        let id = self.subscribers.next_id();
        self.subscribers
            .terminated
            .lock()
            .unwrap()
            .push((id, Arc::from(callback)));
        BackendSubscription {
            set: Arc::downgrade(&self.subscribers),
            id,
        }
    }

    fn on_output(&self, callback: Box<dyn Fn(&OutputEvent) + Send + Sync>) -> BackendSubscription {
        let id = self.subscribers.next_id();
        self.subscribers
            .output
            .lock()
            .unwrap()
            .push((id, Arc::from(callback)));
        BackendSubscription {
            set: Arc::downgrade(&self.subscribers),
            id,
        }
    }

    fn dispose(&self) {
        self.stop_session_internal();
    }
}

impl Drop for DapBackend {
    fn drop(&mut self) {
        self.stop_session_internal();
    }
}

/// Pump-thread event handling: tracker first, subscribers second.
fn handle_adapter_event(
    client: &Arc<DapClient>,
    tracker: &Arc<Mutex<StateTracker>>,
    subscribers: &Arc<SubscriberSet>,
    event: &Event,
) {
    match event.event.as_str() {
        "stopped" => {
            let Some(stopped) = event.body_as::<StoppedEvent>() else {
                log::warn!(target: "backend", "stopped event without a usable body");
                return;
            };
            let thread_id = {
                let mut tracker = tracker.lock().unwrap();
                tracker.on_stopped(&stopped);
                tracker.current_thread_id()
            };

            if let Some(thread_id) = thread_id
                && let Some(body) =
                    crate::weak_error!(client.stack_trace(thread_id, 0, 1), "stackTrace after stop:")
                && let Some(frame) = body.stack_frames.first()
            {
                tracker.lock().unwrap().set_current_frame(frame_info_from(frame));
            }

            subscribers.notify_stopped(&stopped);
        }
        "continued" => {
            tracker.lock().unwrap().on_continued();
        }
        "output" => {
            let Some(output) = event.body_as::<OutputEvent>() else {
                return;
            };
            tracker
                .lock()
                .unwrap()
                .push_output(output.category, &output.output, now_millis());
            subscribers.notify_output(&output);
        }
        "terminated" => {
            let terminated = event.body_as::<TerminatedEvent>().unwrap_or_default();
            let transitioned = tracker.lock().unwrap().on_terminated();
            if transitioned {
                subscribers.notify_terminated(&terminated);
            }
        }
        "exited" => {
            if let Some(body) = event.body_as::<ExitedEventBody>() {
                log::info!(target: "backend", "debuggee exited with code {}", body.exit_code);
            }
        }
        other => {
            log::trace!(target: "backend", "unhandled adapter event `{other}`");
        }
    }
}

/// Tracker shape of an adapter stack frame. The handshake negotiates 1-based
/// columns, so a frame without one defaults to column 1; a missing source
/// name falls back to the path's file name.
fn frame_info_from(frame: &crate::dap::protocol::StackFrame) -> FrameInfo {
    let source = frame.source.as_ref().map(|source| SourceRef {
        path: source.path.clone(),
        name: source.name.clone().or_else(|| {
            source.path.as_deref().and_then(|path| {
                Path::new(path)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
        }),
    });
    FrameInfo {
        id: frame.id,
        name: frame.name.clone(),
        line: frame.line,
        column: frame.column.unwrap_or(1),
        source,
    }
}

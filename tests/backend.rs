//! End-to-end backend scenarios against the scripted `mock-adapter` binary.

use debugmcp::backend::{BackendOptions, DapBackend, DebugBackend, VariableScope};
use debugmcp::cfg::AdapterDescriptor;
use debugmcp::error::Error;
use debugmcp::types::{Breakpoint, DebugConfig, OutputQuery, RequestKind, Uri};
use indexmap::IndexMap;
use serde_json::Value;
use serial_test::serial;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(10);

fn mock_adapters() -> IndexMap<String, AdapterDescriptor> {
    let mut adapters = IndexMap::new();
    adapters.insert(
        "mock".to_string(),
        AdapterDescriptor {
            command: env!("CARGO_BIN_EXE_mock-adapter").to_string(),
            args: Vec::new(),
            cwd: None,
            env: IndexMap::new(),
        },
    );
    adapters
}

fn backend() -> DapBackend {
    DapBackend::with_options(
        mock_adapters(),
        BackendOptions {
            init_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
            ..BackendOptions::default()
        },
    )
}

fn launch_config(program: &Path) -> DebugConfig {
    DebugConfig::new("mock", RequestKind::Launch, "Mock session")
        .with("program", program.to_string_lossy().into_owned())
}

/// Source fixture with 30 numbered lines, `line 1` .. `line 30`.
fn write_fixture(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("debugmcp-{}-{name}", std::process::id()));
    let content: String = (1..=30).map(|n| format!("line {n}\n")).collect();
    std::fs::write(&path, content).unwrap();
    path
}

fn subscribe_stopped(backend: &DapBackend) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    let _ = backend.on_stopped(Box::new(move |event| {
        let _ = tx.send(event.reason.clone());
    }));
    rx
}

fn subscribe_terminated(backend: &DapBackend) -> Receiver<()> {
    let (tx, rx) = mpsc::channel();
    let _ = backend.on_terminated(Box::new(move |_| {
        let _ = tx.send(());
    }));
    rx
}

/// The mock adapter replays every request it has received through
/// `evaluate("__requests")`.
fn request_log(backend: &DapBackend) -> Vec<Value> {
    let evaluated = backend
        .evaluate_expression(None, "__requests", None)
        .expect("request log");
    serde_json::from_str(&evaluated.result).expect("request log JSON")
}

fn entries<'a>(log: &'a [Value], command: &str) -> Vec<&'a Value> {
    log.iter()
        .filter(|entry| entry["command"] == command)
        .collect()
}

#[test]
#[serial]
fn breakpoints_sync_once_before_configuration_done_and_stop_populates_state() {
    let fixture = write_fixture("p.py");
    let backend = backend();
    let stopped = subscribe_stopped(&backend);

    let uri = Uri::file(&fixture);
    backend.add_breakpoint(&uri, 10).unwrap();
    backend.add_breakpoint(&uri, 20).unwrap();
    assert_eq!(backend.get_breakpoints().len(), 2);

    backend
        .start_debugging(fixture.parent().unwrap(), launch_config(&fixture))
        .unwrap();
    assert!(backend.has_active_session());

    assert_eq!(stopped.recv_timeout(WAIT).unwrap(), "breakpoint");

    let state = backend.get_current_debug_state(None, 2).unwrap();
    assert!(state.session_active);
    assert_eq!(state.thread_id, Some(1));
    assert!(state.frame_id.is_some());
    assert_eq!(state.current_line, Some(10));
    assert!(
        state.file_name.as_deref().is_some_and(|name| name.ends_with("p.py")),
        "{:?}",
        state.file_name
    );
    assert_eq!(state.current_line_content.as_deref(), Some("line 10"));
    assert_eq!(state.next_lines, vec!["line 11", "line 12"]);

    // Exactly one setBreakpoints for the path, lines [10, 20] in insertion
    // order, delivered before configurationDone.
    let log = request_log(&backend);
    let set_breakpoints = entries(&log, "setBreakpoints");
    assert_eq!(set_breakpoints.len(), 1);
    let lines: Vec<i64> = set_breakpoints[0]["arguments"]["breakpoints"]
        .as_array()
        .unwrap()
        .iter()
        .map(|bp| bp["line"].as_i64().unwrap())
        .collect();
    assert_eq!(lines, vec![10, 20]);

    let position = |command: &str| log.iter().position(|entry| entry["command"] == command);
    assert!(position("setBreakpoints").unwrap() < position("configurationDone").unwrap());
    assert!(position("initialize").unwrap() < position("launch").unwrap());

    backend.stop_debugging(None).unwrap();
}

#[test]
#[serial]
fn stepping_advances_the_reported_line() {
    let fixture = write_fixture("step.py");
    let backend = backend();
    let stopped = subscribe_stopped(&backend);

    backend.add_breakpoint(&Uri::file(&fixture), 10).unwrap();
    backend
        .start_debugging(fixture.parent().unwrap(), launch_config(&fixture))
        .unwrap();
    assert_eq!(stopped.recv_timeout(WAIT).unwrap(), "breakpoint");

    backend.step_over(None).unwrap();
    assert_eq!(stopped.recv_timeout(WAIT).unwrap(), "step");

    let state = backend.get_current_debug_state(None, 0).unwrap();
    assert_eq!(state.current_line, Some(11));
    assert_eq!(state.current_line_content.as_deref(), Some("line 11"));
    assert!(state.next_lines.is_empty());

    // The adapter saw `next` for the first (and only) thread.
    let log = request_log(&backend);
    let next = entries(&log, "next");
    assert_eq!(next.len(), 1);
    assert_eq!(next[0]["arguments"]["threadId"], 1);

    assert!(backend.get_active_frame_id(None).is_some());

    backend.stop_debugging(None).unwrap();
}

#[test]
#[serial]
fn continue_runs_to_the_next_breakpoint() {
    let fixture = write_fixture("cont.py");
    let backend = backend();
    let stopped = subscribe_stopped(&backend);

    let uri = Uri::file(&fixture);
    backend.add_breakpoint(&uri, 5).unwrap();
    backend.add_breakpoint(&uri, 12).unwrap();
    backend
        .start_debugging(fixture.parent().unwrap(), launch_config(&fixture))
        .unwrap();
    assert_eq!(stopped.recv_timeout(WAIT).unwrap(), "breakpoint");
    assert_eq!(
        backend.get_current_debug_state(None, 0).unwrap().current_line,
        Some(5)
    );

    backend.continue_execution(None).unwrap();
    assert_eq!(stopped.recv_timeout(WAIT).unwrap(), "breakpoint");
    assert_eq!(
        backend.get_current_debug_state(None, 0).unwrap().current_line,
        Some(12)
    );

    backend.stop_debugging(None).unwrap();
}

#[test]
#[serial]
fn live_breakpoint_edits_reconcile_the_complete_set() {
    let fixture = write_fixture("live.py");
    let backend = backend();
    let stopped = subscribe_stopped(&backend);

    let uri = Uri::file(&fixture);
    backend.add_breakpoint(&uri, 10).unwrap();
    backend
        .start_debugging(fixture.parent().unwrap(), launch_config(&fixture))
        .unwrap();
    stopped.recv_timeout(WAIT).unwrap();

    // Add while active: the adapter hears the full set [10, 15].
    backend.add_breakpoint(&uri, 15).unwrap();
    // Duplicate add: no change, no reconcile.
    backend.add_breakpoint(&uri, 15).unwrap();

    let log = request_log(&backend);
    let set_breakpoints = entries(&log, "setBreakpoints");
    assert_eq!(set_breakpoints.len(), 2);
    let last_lines: Vec<i64> = set_breakpoints[1]["arguments"]["breakpoints"]
        .as_array()
        .unwrap()
        .iter()
        .map(|bp| bp["line"].as_i64().unwrap())
        .collect();
    assert_eq!(last_lines, vec![10, 15]);

    // Clearing sends one final empty set for the path; a second clear causes
    // no further requests.
    backend.clear_all_breakpoints().unwrap();
    backend.clear_all_breakpoints().unwrap();

    let log = request_log(&backend);
    let set_breakpoints = entries(&log, "setBreakpoints");
    assert_eq!(set_breakpoints.len(), 3);
    assert!(
        set_breakpoints[2]["arguments"]["breakpoints"]
            .as_array()
            .unwrap()
            .is_empty()
    );
    assert!(backend.get_breakpoints().is_empty());

    backend.stop_debugging(None).unwrap();
}

#[test]
#[serial]
fn function_breakpoints_join_the_initial_sync() {
    let fixture = write_fixture("func.py");
    let backend = backend();
    let stopped = subscribe_stopped(&backend);

    backend.add_breakpoint(&Uri::file(&fixture), 10).unwrap();
    backend
        .add_function_breakpoint(debugmcp::types::FunctionBreakpoint::named("handler"))
        .unwrap();
    assert!(matches!(
        backend.get_breakpoints().last(),
        Some(Breakpoint::Function(fbp)) if fbp.name == "handler"
    ));

    backend
        .start_debugging(fixture.parent().unwrap(), launch_config(&fixture))
        .unwrap();
    stopped.recv_timeout(WAIT).unwrap();

    let log = request_log(&backend);
    let function_sets = entries(&log, "setFunctionBreakpoints");
    assert_eq!(function_sets.len(), 1);
    assert_eq!(
        function_sets[0]["arguments"]["breakpoints"][0]["name"],
        "handler"
    );

    backend.stop_debugging(None).unwrap();
}

#[test]
#[serial]
fn variables_filter_by_scope_and_evaluate_uses_the_current_frame() {
    let fixture = write_fixture("vars.py");
    let backend = backend();
    let stopped = subscribe_stopped(&backend);

    backend.add_breakpoint(&Uri::file(&fixture), 10).unwrap();
    backend
        .start_debugging(fixture.parent().unwrap(), launch_config(&fixture))
        .unwrap();
    stopped.recv_timeout(WAIT).unwrap();

    let frame_id = backend.get_active_frame_id(None).unwrap();

    let locals = backend
        .get_variables(None, frame_id, VariableScope::Local)
        .unwrap();
    assert_eq!(locals.len(), 1);
    let scope = locals.get("Locals").unwrap();
    assert!(scope.error.is_none());
    assert!(scope.variables.iter().any(|var| var.name == "x" && var.value == "42"));

    let all = backend
        .get_variables(None, frame_id, VariableScope::All)
        .unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.contains_key("Globals"));

    let evaluated = backend
        .evaluate_expression(None, "1 + 1", None)
        .unwrap();
    assert_eq!(evaluated.result, "<1 + 1>");

    backend.stop_debugging(None).unwrap();
}

#[test]
#[serial]
fn program_output_is_buffered_until_termination_clears_it() {
    let fixture = write_fixture("out.py");
    let backend = backend();
    let terminated = subscribe_terminated(&backend);

    let (output_tx, output_rx) = mpsc::channel();
    let _ = backend.on_output(Box::new(move |event| {
        let _ = output_tx.send(event.output.clone());
    }));

    // No breakpoints: the mock program runs to completion immediately.
    backend
        .start_debugging(fixture.parent().unwrap(), launch_config(&fixture))
        .unwrap();

    let output = output_rx.recv_timeout(WAIT).unwrap();
    assert!(output.contains("mock program finished"));

    terminated.recv_timeout(WAIT).unwrap();
    assert!(!backend.has_active_session());

    // Termination cleared the ring buffer.
    let snapshot = backend.get_recent_output(OutputQuery::default());
    assert!(snapshot.stdout.is_empty());
    assert!(snapshot.stderr.is_empty());

    backend.stop_debugging(None).unwrap();
}

#[test]
#[serial]
fn adapter_crash_terminates_the_session() {
    let fixture = write_fixture("crash.py");
    let backend = backend();
    let stopped = subscribe_stopped(&backend);
    let terminated = subscribe_terminated(&backend);

    backend.add_breakpoint(&Uri::file(&fixture), 10).unwrap();
    backend
        .start_debugging(fixture.parent().unwrap(), launch_config(&fixture))
        .unwrap();
    stopped.recv_timeout(WAIT).unwrap();

    // The adapter dies before answering; the pending request fails with a
    // session-level error rather than hanging.
    let err = backend
        .evaluate_expression(None, "__crash:2", None)
        .unwrap_err();
    assert!(
        matches!(err, Error::ClientClosed | Error::RequestTimedOut { .. }),
        "{err}"
    );

    terminated.recv_timeout(WAIT).unwrap();
    assert!(!backend.has_active_session());

    backend.stop_debugging(None).unwrap();
    let err = backend.step_over(None).unwrap_err();
    assert!(matches!(err, Error::NoActiveSession), "{err}");
}

#[test]
#[serial]
fn restart_reuses_the_remembered_launch() {
    let fixture = write_fixture("restart.py");
    let backend = backend();
    let stopped = subscribe_stopped(&backend);

    backend.add_breakpoint(&Uri::file(&fixture), 10).unwrap();
    backend
        .start_debugging(fixture.parent().unwrap(), launch_config(&fixture))
        .unwrap();
    stopped.recv_timeout(WAIT).unwrap();
    let first_session = backend.session_id().unwrap();

    backend.restart(None).unwrap();
    assert_eq!(stopped.recv_timeout(WAIT).unwrap(), "breakpoint");
    let second_session = backend.session_id().unwrap();
    assert_ne!(first_session, second_session);

    backend.stop_debugging(None).unwrap();
    let err = backend.restart(None).unwrap_err();
    assert!(matches!(err, Error::NothingToRestart), "{err}");
}

#[test]
#[serial]
fn mismatched_session_id_is_no_such_session() {
    let fixture = write_fixture("sess.py");
    let backend = backend();
    let stopped = subscribe_stopped(&backend);

    backend.add_breakpoint(&Uri::file(&fixture), 10).unwrap();
    backend
        .start_debugging(fixture.parent().unwrap(), launch_config(&fixture))
        .unwrap();
    stopped.recv_timeout(WAIT).unwrap();

    let err = backend.step_over(Some("not-a-session")).unwrap_err();
    assert!(matches!(err, Error::NoSuchSession(_)), "{err}");

    // The real id works.
    let id = backend.session_id().unwrap();
    backend.step_over(Some(&id)).unwrap();
    stopped.recv_timeout(WAIT).unwrap();

    backend.stop_debugging(None).unwrap();
}

#[test]
#[serial]
fn unconfigured_language_fails_with_the_available_list() {
    let backend = backend();
    let config = DebugConfig::new("python", RequestKind::Launch, "nope");
    let err = backend
        .start_debugging(Path::new("/tmp"), config)
        .unwrap_err();
    match err {
        Error::NoAdapterConfigured { language, available } => {
            assert_eq!(language, "python");
            assert_eq!(available, vec!["mock".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!backend.has_active_session());
}

#[test]
#[serial]
fn stop_debugging_twice_is_a_no_op() {
    let fixture = write_fixture("stop.py");
    let backend = backend();
    let stopped = subscribe_stopped(&backend);

    backend.add_breakpoint(&Uri::file(&fixture), 10).unwrap();
    backend
        .start_debugging(fixture.parent().unwrap(), launch_config(&fixture))
        .unwrap();
    stopped.recv_timeout(WAIT).unwrap();

    backend.stop_debugging(None).unwrap();
    backend.stop_debugging(None).unwrap();
    assert!(!backend.has_active_session());
    assert!(!backend.get_current_debug_state(None, 3).unwrap().session_active);
}

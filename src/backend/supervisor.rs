//! Adapter child process supervision.
//!
//! The supervisor owns the only handle to the adapter process: it spawns the
//! child with piped stdio, wires stdout/stdin into a [`DapClient`], forwards
//! stderr to the diagnostic log, watches for exit and performs the ordered
//! shutdown (best-effort disconnect, client close, SIGTERM, SIGKILL).

use crate::cfg::AdapterDescriptor;
use crate::dap::client::DapClient;
use crate::dap::protocol::Capabilities;
use crate::error::{Error, Result};
use indexmap::IndexMap;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use serde_json::json;
use std::io::{BufRead, BufReader};
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, Stdio};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

/// Client identity sent in the `initialize` handshake.
pub const CLIENT_ID: &str = "debugmcp";

const TERMINATE_GRACE: Duration = Duration::from_secs(2);
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// How the adapter process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterExitStatus {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

/// Lifecycle notifications published by the supervisor.
#[derive(Debug, Clone)]
pub enum AdapterEvent {
    Exited {
        adapter: String,
        code: Option<i32>,
        signal: Option<i32>,
    },
    /// Emitted in addition to [`AdapterEvent::Exited`] when the exit code is
    /// present and non-zero.
    Crashed {
        adapter: String,
        code: Option<i32>,
        signal: Option<i32>,
    },
}

type AdapterEventHook = Arc<dyn Fn(&AdapterEvent) + Send + Sync>;

/// One-slot gate the exit watcher fills and `stop` waits on.
#[derive(Default)]
struct ExitGate {
    status: Mutex<Option<AdapterExitStatus>>,
    cond: Condvar,
}

impl ExitGate {
    fn set(&self, status: AdapterExitStatus) {
        *self.status.lock().unwrap() = Some(status);
        self.cond.notify_all();
    }

    fn get(&self) -> Option<AdapterExitStatus> {
        *self.status.lock().unwrap()
    }

    fn wait(&self, timeout: Duration) -> Option<AdapterExitStatus> {
        let guard = self.status.lock().unwrap();
        let (guard, _) = self
            .cond
            .wait_timeout_while(guard, timeout, |status| status.is_none())
            .unwrap();
        *guard
    }
}

struct ActiveAdapter {
    language: String,
    pid: i32,
    client: Arc<DapClient>,
    capabilities: Option<Capabilities>,
    gate: Arc<ExitGate>,
}

pub struct AdapterSupervisor {
    adapters: IndexMap<String, AdapterDescriptor>,
    request_timeout: Duration,
    active: Arc<Mutex<Option<ActiveAdapter>>>,
    hook: Arc<Mutex<Option<AdapterEventHook>>>,
}

impl AdapterSupervisor {
    pub fn new(adapters: IndexMap<String, AdapterDescriptor>) -> Self {
        Self::with_request_timeout(adapters, crate::dap::client::DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_request_timeout(
        adapters: IndexMap<String, AdapterDescriptor>,
        request_timeout: Duration,
    ) -> Self {
        AdapterSupervisor {
            adapters,
            request_timeout,
            active: Arc::new(Mutex::new(None)),
            hook: Arc::new(Mutex::new(None)),
        }
    }

    /// Install the single lifecycle hook (the backend).
    pub fn set_event_hook(&self, hook: impl Fn(&AdapterEvent) + Send + Sync + 'static) {
        *self.hook.lock().unwrap() = Some(Arc::new(hook));
    }

    pub fn languages(&self) -> Vec<String> {
        self.adapters.keys().cloned().collect()
    }

    pub fn has_active(&self) -> bool {
        self.active.lock().unwrap().is_some()
    }

    pub fn client(&self) -> Option<Arc<DapClient>> {
        self.active
            .lock()
            .unwrap()
            .as_ref()
            .map(|adapter| Arc::clone(&adapter.client))
    }

    /// Capabilities reported by the adapter's `initialize` response.
    pub fn capabilities(&self) -> Option<Capabilities> {
        self.active
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|adapter| adapter.capabilities.clone())
    }

    /// Spawn the adapter configured for `language` and wire up its stdio.
    /// Refuses when an adapter is already active.
    pub fn start(&self, language: &str) -> Result<Arc<DapClient>> {
        let mut active = self.active.lock().unwrap();
        if active.is_some() {
            return Err(Error::AdapterAlreadyActive);
        }

        let descriptor =
            self.adapters
                .get(language)
                .ok_or_else(|| Error::NoAdapterConfigured {
                    language: language.to_string(),
                    available: self.languages(),
                })?;

        log::info!(
            target: "adapter",
            "spawning adapter for `{language}`: {} {:?}",
            descriptor.command,
            descriptor.args
        );

        let mut command = Command::new(&descriptor.command);
        command
            .args(&descriptor.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .envs(&descriptor.env);
        if let Some(cwd) = &descriptor.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|source| Error::AdapterSpawnFailed {
            command: descriptor.command.clone(),
            source,
        })?;
        let pid = child.id() as i32;

        let stdout = child.stdout.take().expect("piped stdout");
        let stdin = child.stdin.take().expect("piped stdin");
        let stderr = child.stderr.take().expect("piped stderr");

        let client = Arc::new(DapClient::with_timeout(stdout, stdin, self.request_timeout));
        let gate = Arc::new(ExitGate::default());

        // Stderr is diagnostics, never protocol data.
        thread::Builder::new()
            .name("adapter-stderr".to_string())
            .spawn({
                let language = language.to_string();
                move || {
                    for line in BufReader::new(stderr).lines() {
                        match line {
                            Ok(line) => log::debug!(target: "adapter", "{language} stderr: {line}"),
                            Err(_) => break,
                        }
                    }
                }
            })
            .expect("spawn adapter stderr thread");

        thread::Builder::new()
            .name("adapter-exit".to_string())
            .spawn({
                let language = language.to_string();
                let client = Arc::clone(&client);
                let gate = Arc::clone(&gate);
                let active = Arc::clone(&self.active);
                let hook = Arc::clone(&self.hook);
                move || {
                    let status = child.wait();
                    let status = AdapterExitStatus {
                        code: status.as_ref().ok().and_then(|status| status.code()),
                        signal: status.as_ref().ok().and_then(|status| status.signal()),
                    };
                    log::info!(
                        target: "adapter",
                        "adapter `{language}` exited (code {:?}, signal {:?})",
                        status.code,
                        status.signal
                    );

                    gate.set(status);
                    client.close();
                    {
                        let mut active = active.lock().unwrap();
                        if active.as_ref().is_some_and(|adapter| adapter.pid == pid) {
                            *active = None;
                        }
                    }

                    let hook = hook.lock().unwrap().clone();
                    if let Some(hook) = hook {
                        hook(&AdapterEvent::Exited {
                            adapter: language.clone(),
                            code: status.code,
                            signal: status.signal,
                        });
                        if status.code.is_some_and(|code| code != 0) {
                            hook(&AdapterEvent::Crashed {
                                adapter: language,
                                code: status.code,
                                signal: status.signal,
                            });
                        }
                    }
                }
            })
            .expect("spawn adapter exit thread");

        *active = Some(ActiveAdapter {
            language: language.to_string(),
            pid,
            client: Arc::clone(&client),
            capabilities: None,
            gate,
        });

        Ok(client)
    }

    /// Perform the `initialize` handshake and retain the adapter's
    /// capabilities. 1-based lines and columns are negotiated; only
    /// `supportsVariableType` is opted in.
    pub fn initialize(&self) -> Result<Capabilities> {
        let client = self.client().ok_or(Error::NoActiveSession)?;
        let capabilities = client.initialize(CLIENT_ID)?;
        if let Some(adapter) = self.active.lock().unwrap().as_mut() {
            adapter.capabilities = Some(capabilities.clone());
        }
        Ok(capabilities)
    }

    /// Ordered, idempotent shutdown: best-effort `disconnect`, close the
    /// client, then SIGTERM with a grace period and SIGKILL as a last resort.
    pub fn stop(&self) {
        let Some(adapter) = self.active.lock().unwrap().take() else {
            return;
        };
        log::info!(target: "adapter", "stopping adapter `{}`", adapter.language);

        let _ = adapter.client.request_with_timeout(
            "disconnect",
            json!({"terminateDebuggee": true}),
            DISCONNECT_TIMEOUT,
        );
        adapter.client.close();

        if adapter.gate.get().is_none() {
            let _ = kill(Pid::from_raw(adapter.pid), Signal::SIGTERM);
            if adapter.gate.wait(TERMINATE_GRACE).is_none() {
                log::warn!(
                    target: "adapter",
                    "adapter `{}` ignored SIGTERM, sending SIGKILL",
                    adapter.language
                );
                let _ = kill(Pid::from_raw(adapter.pid), Signal::SIGKILL);
                let _ = adapter.gate.wait(TERMINATE_GRACE);
            }
        }
    }
}

impl Drop for AdapterSupervisor {
    fn drop(&mut self) {
        self.stop();
    }
}

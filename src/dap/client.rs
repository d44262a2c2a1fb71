//! Full-duplex DAP client over a byte stream pair.
//!
//! A dedicated reader thread is the single consumer of the adapter's output
//! stream: it feeds the frame decoder, resolves pending requests by
//! `request_seq` and fans events out to subscribers. Callers block on a
//! one-shot channel per request, which doubles as the per-request timer.

use crate::dap::codec::{FrameDecoder, encode};
use crate::dap::protocol::{
    Capabilities, Event, Incoming, OutgoingRequest, Response, ReverseRequest,
    EvaluateResponseBody, ScopesResponseBody, StackTraceResponseBody, ThreadsResponseBody,
    VariablesResponseBody,
};
use crate::error::{Error, Result};
use crate::types::{FunctionBreakpoint, SourceBreakpoint, ThreadInfo};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::Duration;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

type EventCallback = Arc<dyn Fn(&Event) + Send + Sync>;
type ReverseRequestCallback = Arc<dyn Fn(&ReverseRequest) + Send + Sync>;
type NotificationCallback = Arc<dyn Fn(&ClientNotification) + Send + Sync>;

/// Out-of-band client lifecycle notifications. These never fail an operation;
/// they exist for diagnostics and tests.
#[derive(Debug)]
pub enum ClientNotification {
    /// A response arrived for a request nobody is waiting on anymore.
    OrphanResponse(Response),
    /// A frame body failed to decode as JSON.
    ParseError(String),
    /// The client transitioned to closed.
    Closed,
}

struct PendingRequest {
    command: String,
    tx: mpsc::Sender<std::result::Result<Response, Error>>,
}

#[derive(Default)]
struct Subscriptions {
    any: Vec<(u64, EventCallback)>,
    by_name: HashMap<String, Vec<(u64, EventCallback)>>,
    reverse: Vec<(u64, ReverseRequestCallback)>,
    notifications: Vec<(u64, NotificationCallback)>,
}

impl Subscriptions {
    fn remove(&mut self, id: u64) {
        self.any.retain(|(sub_id, _)| *sub_id != id);
        self.by_name
            .values_mut()
            .for_each(|subs| subs.retain(|(sub_id, _)| *sub_id != id));
        self.reverse.retain(|(sub_id, _)| *sub_id != id);
        self.notifications.retain(|(sub_id, _)| *sub_id != id);
    }
}

struct Shared {
    writer: Mutex<Option<Box<dyn Write + Send>>>,
    pending: Mutex<HashMap<i64, PendingRequest>>,
    subs: Mutex<Subscriptions>,
    next_seq: AtomicI64,
    next_sub_id: AtomicU64,
    closed: AtomicBool,
    default_timeout: Duration,
}

impl Shared {
    /// Mark closed, fail every pending request exactly once, notify
    /// subscribers. Idempotent.
    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.writer.lock().unwrap() = None;
        let pending: Vec<PendingRequest> = {
            let mut pending = self.pending.lock().unwrap();
            pending.drain().map(|(_, entry)| entry).collect()
        };
        for entry in pending {
            log::debug!(target: "dap", "failing pending request '{}' on close", entry.command);
            let _ = entry.tx.send(Err(Error::ClientClosed));
        }
        self.notify(&ClientNotification::Closed);
    }

    fn notify(&self, notification: &ClientNotification) {
        let callbacks: Vec<NotificationCallback> = {
            let subs = self.subs.lock().unwrap();
            subs.notifications.iter().map(|(_, cb)| cb.clone()).collect()
        };
        for callback in callbacks {
            callback(notification);
        }
    }

    fn dispatch_event(&self, event: &Event) {
        let callbacks: Vec<EventCallback> = {
            let subs = self.subs.lock().unwrap();
            subs.any
                .iter()
                .map(|(_, cb)| cb.clone())
                .chain(
                    subs.by_name
                        .get(&event.event)
                        .into_iter()
                        .flatten()
                        .map(|(_, cb)| cb.clone()),
                )
                .collect()
        };
        for callback in callbacks {
            callback(event);
        }
    }

    fn dispatch_reverse_request(&self, request: &ReverseRequest) {
        let callbacks: Vec<ReverseRequestCallback> = {
            let subs = self.subs.lock().unwrap();
            subs.reverse.iter().map(|(_, cb)| cb.clone()).collect()
        };
        for callback in callbacks {
            callback(request);
        }
    }

    fn handle(&self, incoming: Incoming) {
        match incoming {
            Incoming::Response(response) => {
                let entry = self.pending.lock().unwrap().remove(&response.request_seq);
                match entry {
                    Some(entry) => {
                        if entry.tx.send(Ok(response)).is_err() {
                            // The awaiter gave up between timer expiry and
                            // entry removal; surface it the same way as any
                            // late response.
                            log::debug!(target: "dap", "awaiter for '{}' is gone", entry.command);
                        }
                    }
                    None => {
                        log::warn!(
                            target: "dap",
                            "orphan response for request_seq={} ({})",
                            response.request_seq,
                            response.command
                        );
                        self.notify(&ClientNotification::OrphanResponse(response));
                    }
                }
            }
            Incoming::Event(event) => {
                log::trace!(target: "dap", "<- event {}", event.event);
                self.dispatch_event(&event);
            }
            Incoming::Request(request) => {
                log::trace!(target: "dap", "<- reverse request {}", request.command);
                self.dispatch_reverse_request(&request);
            }
        }
    }
}

/// Handle that removes one subscription when disposed.
pub struct Subscription {
    shared: Weak<Shared>,
    id: u64,
}

impl Subscription {
    pub fn dispose(self) {
        self.cancel();
    }

    fn cancel(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.subs.lock().unwrap().remove(self.id);
        }
    }
}

/// One-shot waiter for a named event, armed at construction time.
pub struct EventWaiter {
    rx: mpsc::Receiver<Event>,
    sub: Subscription,
}

impl EventWaiter {
    /// Block until the event arrives. `None` on timeout or client close.
    pub fn wait(self, timeout: Duration) -> Option<Event> {
        let event = self.rx.recv_timeout(timeout).ok();
        self.sub.cancel();
        event
    }
}

pub struct DapClient {
    shared: Arc<Shared>,
}

impl DapClient {
    /// Build a client over an input/output stream pair and start the reader
    /// thread. The input stream must have exactly one consumer: this client.
    pub fn new(
        input: impl Read + Send + 'static,
        output: impl Write + Send + 'static,
    ) -> DapClient {
        Self::with_timeout(input, output, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        input: impl Read + Send + 'static,
        output: impl Write + Send + 'static,
        default_timeout: Duration,
    ) -> DapClient {
        let shared = Arc::new(Shared {
            writer: Mutex::new(Some(Box::new(output) as Box<dyn Write + Send>)),
            pending: Mutex::new(HashMap::new()),
            subs: Mutex::new(Subscriptions::default()),
            next_seq: AtomicI64::new(1),
            next_sub_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            default_timeout,
        });

        // The reader detaches: it unblocks on stream EOF once the adapter
        // dies, which may be well after `close`.
        thread::Builder::new()
            .name("dap-reader".to_string())
            .spawn({
                let shared = Arc::clone(&shared);
                move || reader_loop(input, &shared)
            })
            .expect("spawn dap reader thread");

        DapClient { shared }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Close the client: fail all pending requests, drop the output stream
    /// (EOF for the adapter's stdin), notify subscribers. Idempotent.
    pub fn close(&self) {
        self.shared.close();
    }

    // --------------------------------- requests --------------------------------------------------

    /// Send a request and await its correlated response body.
    pub fn request(&self, command: &str, arguments: Value) -> Result<Value> {
        self.request_with_timeout(command, arguments, self.shared.default_timeout)
    }

    pub fn request_with_timeout(
        &self,
        command: &str,
        arguments: Value,
        timeout: Duration,
    ) -> Result<Value> {
        if self.is_closed() {
            return Err(Error::ClientClosed);
        }

        let seq = self.shared.next_seq.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel();

        // The pending entry must exist before the write that can produce the
        // matching response.
        self.shared.pending.lock().unwrap().insert(
            seq,
            PendingRequest {
                command: command.to_string(),
                tx,
            },
        );

        let request = OutgoingRequest::new(seq, command, arguments);
        log::trace!(target: "dap", "-> request seq={seq} {command}");
        if let Err(err) = self.write_message(&request) {
            self.shared.pending.lock().unwrap().remove(&seq);
            return Err(err);
        }

        match rx.recv_timeout(timeout) {
            Ok(Ok(response)) => {
                if response.success {
                    Ok(response.take_body())
                } else {
                    Err(Error::RequestFailed {
                        command: command.to_string(),
                        message: response
                            .message
                            .unwrap_or_else(|| format!("DAP request '{command}' failed")),
                    })
                }
            }
            Ok(Err(err)) => Err(err),
            Err(RecvTimeoutError::Timeout) => {
                self.shared.pending.lock().unwrap().remove(&seq);
                // The response may have slipped in between timer expiry and
                // the removal above; surface it as an orphan.
                if let Ok(Ok(response)) = rx.try_recv() {
                    self.shared.notify(&ClientNotification::OrphanResponse(response));
                }
                Err(Error::RequestTimedOut {
                    command: command.to_string(),
                    timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(Error::ClientClosed),
        }
    }

    fn write_message<T: serde::Serialize>(&self, message: &T) -> Result<()> {
        let framed = encode(message)?;
        let write_result = {
            let mut guard = self.shared.writer.lock().unwrap();
            let Some(writer) = guard.as_mut() else {
                return Err(Error::ClientClosed);
            };
            writer.write_all(&framed).and_then(|()| writer.flush())
        };
        if let Err(err) = write_result {
            // A broken output stream ends the session for every awaiter.
            self.shared.close();
            return Err(Error::Io(err));
        }
        Ok(())
    }

    // --------------------------------- subscriptions ---------------------------------------------

    /// Subscribe to every adapter event.
    pub fn on_event(&self, callback: impl Fn(&Event) + Send + Sync + 'static) -> Subscription {
        let id = self.next_sub_id();
        self.shared
            .subs
            .lock()
            .unwrap()
            .any
            .push((id, Arc::new(callback)));
        self.subscription(id)
    }

    /// Subscribe to one event by name.
    pub fn on_event_named(
        &self,
        name: &str,
        callback: impl Fn(&Event) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_sub_id();
        self.shared
            .subs
            .lock()
            .unwrap()
            .by_name
            .entry(name.to_string())
            .or_default()
            .push((id, Arc::new(callback)));
        self.subscription(id)
    }

    /// Subscribe to reverse requests (adapter → client). The core never
    /// answers them; this stream exists for observers.
    pub fn on_reverse_request(
        &self,
        callback: impl Fn(&ReverseRequest) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_sub_id();
        self.shared
            .subs
            .lock()
            .unwrap()
            .reverse
            .push((id, Arc::new(callback)));
        self.subscription(id)
    }

    /// Subscribe to out-of-band client notifications (orphan responses,
    /// parse errors, close).
    pub fn on_notification(
        &self,
        callback: impl Fn(&ClientNotification) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_sub_id();
        self.shared
            .subs
            .lock()
            .unwrap()
            .notifications
            .push((id, Arc::new(callback)));
        self.subscription(id)
    }

    /// Arm a one-shot waiter for a named event. Arming happens here, so an
    /// event arriving before the caller blocks in [`EventWaiter::wait`] is
    /// still observed.
    pub fn event_waiter(&self, name: &str) -> EventWaiter {
        let (tx, rx) = mpsc::channel();
        let sub = self.on_event_named(name, move |event| {
            let _ = tx.send(event.clone());
        });
        EventWaiter { rx, sub }
    }

    fn next_sub_id(&self) -> u64 {
        self.shared.next_sub_id.fetch_add(1, Ordering::SeqCst)
    }

    fn subscription(&self, id: u64) -> Subscription {
        Subscription {
            shared: Arc::downgrade(&self.shared),
            id,
        }
    }

    // --------------------------------- typed wrappers --------------------------------------------

    pub fn initialize(&self, client_id: &str) -> Result<Capabilities> {
        let body = self.request(
            "initialize",
            json!({
                "clientID": client_id,
                "clientName": client_id,
                "adapterID": client_id,
                "linesStartAt1": true,
                "columnsStartAt1": true,
                "pathFormat": "path",
                "supportsVariableType": true,
            }),
        )?;
        Ok(serde_json::from_value(body).unwrap_or_default())
    }

    pub fn launch(&self, arguments: Value) -> Result<Value> {
        self.request("launch", arguments)
    }

    pub fn attach(&self, arguments: Value) -> Result<Value> {
        self.request("attach", arguments)
    }

    pub fn disconnect(&self, arguments: Value) -> Result<Value> {
        self.request("disconnect", arguments)
    }

    pub fn terminate(&self) -> Result<Value> {
        self.request("terminate", json!({}))
    }

    pub fn set_breakpoints(&self, path: &Path, breakpoints: &[SourceBreakpoint]) -> Result<Value> {
        self.request(
            "setBreakpoints",
            json!({
                "source": {"path": path},
                "breakpoints": breakpoints,
            }),
        )
    }

    pub fn set_function_breakpoints(&self, breakpoints: &[FunctionBreakpoint]) -> Result<Value> {
        self.request("setFunctionBreakpoints", json!({"breakpoints": breakpoints}))
    }

    pub fn configuration_done(&self) -> Result<Value> {
        self.request("configurationDone", json!({}))
    }

    pub fn continue_execution(&self, thread_id: i64) -> Result<Value> {
        self.request("continue", json!({"threadId": thread_id}))
    }

    pub fn next(&self, thread_id: i64) -> Result<Value> {
        self.request("next", json!({"threadId": thread_id}))
    }

    pub fn step_in(&self, thread_id: i64) -> Result<Value> {
        self.request("stepIn", json!({"threadId": thread_id}))
    }

    pub fn step_out(&self, thread_id: i64) -> Result<Value> {
        self.request("stepOut", json!({"threadId": thread_id}))
    }

    pub fn pause(&self, thread_id: i64) -> Result<Value> {
        self.request("pause", json!({"threadId": thread_id}))
    }

    pub fn stack_trace(
        &self,
        thread_id: i64,
        start_frame: i64,
        levels: i64,
    ) -> Result<StackTraceResponseBody> {
        let body = self.request(
            "stackTrace",
            json!({"threadId": thread_id, "startFrame": start_frame, "levels": levels}),
        )?;
        Ok(serde_json::from_value(body)?)
    }

    pub fn scopes(&self, frame_id: i64) -> Result<ScopesResponseBody> {
        let body = self.request("scopes", json!({"frameId": frame_id}))?;
        Ok(serde_json::from_value(body)?)
    }

    pub fn variables(&self, variables_reference: i64) -> Result<VariablesResponseBody> {
        let body = self.request("variables", json!({"variablesReference": variables_reference}))?;
        Ok(serde_json::from_value(body)?)
    }

    pub fn evaluate(
        &self,
        expression: &str,
        frame_id: Option<i64>,
        context: &str,
    ) -> Result<EvaluateResponseBody> {
        let mut arguments = json!({"expression": expression, "context": context});
        if let Some(frame_id) = frame_id {
            arguments["frameId"] = json!(frame_id);
        }
        let body = self.request("evaluate", arguments)?;
        Ok(serde_json::from_value(body)?)
    }

    pub fn threads(&self) -> Result<Vec<ThreadInfo>> {
        let body = self.request("threads", json!({}))?;
        let body: ThreadsResponseBody = serde_json::from_value(body)?;
        Ok(body.threads)
    }

    pub fn source(&self, source_reference: i64) -> Result<Value> {
        self.request(
            "source",
            json!({"sourceReference": source_reference, "source": {"sourceReference": source_reference}}),
        )
    }
}

impl Drop for DapClient {
    fn drop(&mut self) {
        self.shared.close();
    }
}

fn reader_loop(mut input: impl Read, shared: &Arc<Shared>) {
    let mut decoder = FrameDecoder::new();
    let mut chunk = [0u8; 8 * 1024];
    loop {
        match input.read(&mut chunk) {
            Ok(0) => {
                log::debug!(target: "dap", "adapter stream EOF");
                break;
            }
            Ok(read_n) => {
                decoder.extend(&chunk[..read_n]);
                while let Some(frame) = decoder.decode() {
                    match frame {
                        Ok(incoming) => shared.handle(incoming),
                        Err(err) => {
                            log::warn!(target: "dap", "undecodable DAP body: {err}");
                            shared.notify(&ClientNotification::ParseError(err.to_string()));
                        }
                    }
                }
            }
            Err(err) => {
                if shared.closed.load(Ordering::SeqCst) {
                    break;
                }
                log::warn!(target: "dap", "adapter stream read error: {err}");
                break;
            }
        }
    }
    shared.close();
}

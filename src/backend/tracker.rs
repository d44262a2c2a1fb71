//! Authoritative in-memory session state.
//!
//! The tracker owns the session-state machine, the current thread/frame
//! bookkeeping and the bounded program-output ring buffer. Transitions never
//! fail: inputs that make no sense for the current state are ignored.

use crate::types::{
    FrameInfo, OutputCategory, OutputQuery, OutputRecord, OutputSnapshot, SessionState,
    StoppedEvent, ThreadInfo,
};
use itertools::Itertools;
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_MAX_OUTPUT_LINES: usize = 1000;

/// Milliseconds since the unix epoch, the timestamp unit of output records.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

pub struct StateTracker {
    state: SessionState,
    current_thread_id: Option<i64>,
    current_frame_id: Option<i64>,
    current_frame: Option<FrameInfo>,
    threads: Vec<ThreadInfo>,
    stop_reason: Option<String>,
    output: VecDeque<OutputRecord>,
    max_output_lines: usize,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_OUTPUT_LINES)
    }
}

impl StateTracker {
    pub fn new(max_output_lines: usize) -> Self {
        StateTracker {
            state: SessionState::Inactive,
            current_thread_id: None,
            current_frame_id: None,
            current_frame: None,
            threads: Vec::new(),
            stop_reason: None,
            output: VecDeque::new(),
            max_output_lines,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn current_thread_id(&self) -> Option<i64> {
        self.current_thread_id
    }

    pub fn current_frame_id(&self) -> Option<i64> {
        self.current_frame_id
    }

    pub fn current_frame(&self) -> Option<&FrameInfo> {
        self.current_frame.as_ref()
    }

    pub fn threads(&self) -> &[ThreadInfo] {
        &self.threads
    }

    pub fn stop_reason(&self) -> Option<&str> {
        self.stop_reason.as_deref()
    }

    /// A frame and a thread are known and execution is paused.
    pub fn has_valid_context(&self) -> bool {
        self.state == SessionState::Stopped
            && self.current_frame_id.is_some()
            && self.current_thread_id.is_some()
    }

    // --------------------------------- transitions -----------------------------------------------

    /// `startDebugging` begins.
    pub fn begin_initializing(&mut self) {
        if matches!(self.state, SessionState::Inactive | SessionState::Terminated) {
            self.reset_session_fields();
            self.output.clear();
            self.state = SessionState::Initializing;
        }
    }

    /// Handshake finished: breakpoints synced and `configurationDone`
    /// returned. A `stopped` that raced ahead of this call wins.
    pub fn mark_running(&mut self) {
        if self.state == SessionState::Initializing {
            self.state = SessionState::Running;
        }
    }

    /// The adapter reported a stop. Frame details arrive separately through
    /// [`StateTracker::set_current_frame`].
    pub fn on_stopped(&mut self, event: &StoppedEvent) {
        if !matches!(
            self.state,
            SessionState::Running | SessionState::Initializing | SessionState::Stopped
        ) {
            return;
        }
        self.state = SessionState::Stopped;
        self.stop_reason = Some(event.reason.clone());
        if event.thread_id.is_some() {
            self.current_thread_id = event.thread_id;
        }
    }

    /// A continue or step was accepted (or the adapter announced
    /// `continued`). The thread stays current; the frame does not.
    pub fn on_continued(&mut self) {
        if self.state != SessionState::Stopped {
            return;
        }
        self.state = SessionState::Running;
        self.current_frame_id = None;
        self.current_frame = None;
        self.stop_reason = None;
    }

    /// Session over (adapter `terminated` event or process exit). Returns
    /// whether this call performed the transition, so callers can publish the
    /// event exactly once.
    pub fn on_terminated(&mut self) -> bool {
        if !matches!(
            self.state,
            SessionState::Initializing | SessionState::Running | SessionState::Stopped
        ) {
            return false;
        }
        self.state = SessionState::Terminated;
        self.reset_session_fields();
        self.output.clear();
        true
    }

    /// `stopDebugging`/`dispose` completed.
    pub fn mark_inactive(&mut self) {
        self.state = SessionState::Inactive;
        self.reset_session_fields();
        self.output.clear();
    }

    fn reset_session_fields(&mut self) {
        self.current_thread_id = None;
        self.current_frame_id = None;
        self.current_frame = None;
        self.threads.clear();
        self.stop_reason = None;
    }

    /// Frame details are meaningful only while stopped.
    pub fn set_current_frame(&mut self, frame: FrameInfo) {
        if self.state != SessionState::Stopped {
            return;
        }
        self.current_frame_id = Some(frame.id);
        self.current_frame = Some(frame);
    }

    pub fn set_threads(&mut self, threads: Vec<ThreadInfo>) {
        self.threads = threads;
    }

    pub fn set_current_thread(&mut self, thread_id: i64) {
        self.current_thread_id = Some(thread_id);
    }

    // --------------------------------- output buffer ---------------------------------------------

    /// Record an output payload: split on CR/LF, skip empty segments, drop
    /// the oldest lines past the cap.
    pub fn push_output(&mut self, category: OutputCategory, payload: &str, timestamp: u64) {
        for segment in payload.split(['\r', '\n']) {
            if segment.is_empty() {
                continue;
            }
            self.output.push_back(OutputRecord {
                text: segment.to_string(),
                category,
                timestamp,
            });
        }
        while self.output.len() > self.max_output_lines {
            self.output.pop_front();
        }
    }

    /// Snapshot of buffered output. `stdout` carries both `stdout` and
    /// `console` lines; `truncated` reports whether the max-lines trim
    /// dropped anything.
    pub fn query_output(&self, query: OutputQuery) -> OutputSnapshot {
        let matching: Vec<&OutputRecord> = self
            .output
            .iter()
            .filter(|record| query.since.is_none_or(|since| record.timestamp > since))
            .collect();

        let truncated = query
            .max_lines
            .is_some_and(|max_lines| matching.len() > max_lines);
        let keep_from = query
            .max_lines
            .map_or(0, |max_lines| matching.len().saturating_sub(max_lines));

        let kept = &matching[keep_from..];
        let stdout = kept
            .iter()
            .filter(|record| {
                matches!(
                    record.category,
                    OutputCategory::Stdout | OutputCategory::Console
                )
            })
            .map(|record| record.text.as_str())
            .join("\n");
        let stderr = kept
            .iter()
            .filter(|record| record.category == OutputCategory::Stderr)
            .map(|record| record.text.as_str())
            .join("\n");

        OutputSnapshot {
            stdout,
            stderr,
            truncated,
        }
    }

    #[cfg(test)]
    fn output_len(&self) -> usize {
        self.output.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stopped(reason: &str, thread_id: Option<i64>) -> StoppedEvent {
        StoppedEvent {
            reason: reason.to_string(),
            thread_id,
            ..Default::default()
        }
    }

    fn frame(id: i64, line: u32) -> FrameInfo {
        FrameInfo {
            id,
            name: "main".to_string(),
            line,
            column: 1,
            source: None,
        }
    }

    #[test]
    fn linear_session_lifecycle() {
        let mut tracker = StateTracker::default();
        assert_eq!(tracker.state(), SessionState::Inactive);

        tracker.begin_initializing();
        assert_eq!(tracker.state(), SessionState::Initializing);

        tracker.mark_running();
        assert_eq!(tracker.state(), SessionState::Running);

        tracker.on_stopped(&stopped("breakpoint", Some(1)));
        assert_eq!(tracker.state(), SessionState::Stopped);
        assert_eq!(tracker.current_thread_id(), Some(1));
        assert_eq!(tracker.stop_reason(), Some("breakpoint"));

        tracker.on_continued();
        assert_eq!(tracker.state(), SessionState::Running);

        assert!(tracker.on_terminated());
        assert_eq!(tracker.state(), SessionState::Terminated);
        assert!(!tracker.on_terminated());

        tracker.mark_inactive();
        assert_eq!(tracker.state(), SessionState::Inactive);
    }

    #[test]
    fn continued_keeps_thread_but_clears_frame() {
        let mut tracker = StateTracker::default();
        tracker.begin_initializing();
        tracker.mark_running();
        tracker.on_stopped(&stopped("step", Some(7)));
        tracker.set_current_frame(frame(42, 10));
        assert!(tracker.has_valid_context());

        tracker.on_continued();
        assert_eq!(tracker.current_thread_id(), Some(7));
        assert_eq!(tracker.current_frame_id(), None);
        assert!(tracker.current_frame().is_none());
        assert_eq!(tracker.stop_reason(), None);
        assert!(!tracker.has_valid_context());
    }

    #[test]
    fn frame_fields_only_exist_while_stopped() {
        let mut tracker = StateTracker::default();
        tracker.begin_initializing();
        tracker.mark_running();

        // Not stopped: frame assignment is ignored.
        tracker.set_current_frame(frame(1, 3));
        assert_eq!(tracker.current_frame_id(), None);

        tracker.on_stopped(&stopped("pause", Some(1)));
        tracker.set_current_frame(frame(1, 3));
        assert_eq!(tracker.current_frame_id(), Some(1));
    }

    #[test]
    fn a_racing_stop_survives_mark_running() {
        let mut tracker = StateTracker::default();
        tracker.begin_initializing();
        tracker.on_stopped(&stopped("entry", Some(1)));
        tracker.mark_running();
        assert_eq!(tracker.state(), SessionState::Stopped);
    }

    #[test]
    fn malformed_transitions_are_ignored() {
        let mut tracker = StateTracker::default();
        tracker.on_stopped(&stopped("breakpoint", Some(1)));
        assert_eq!(tracker.state(), SessionState::Inactive);
        tracker.on_continued();
        assert_eq!(tracker.state(), SessionState::Inactive);
        assert!(!tracker.on_terminated());
    }

    #[test]
    fn output_ring_drops_oldest_past_the_cap() {
        let mut tracker = StateTracker::new(5);
        for i in 0..8 {
            tracker.push_output(OutputCategory::Stdout, &format!("line {i}"), i);
        }
        assert_eq!(tracker.output_len(), 5);
        let snapshot = tracker.query_output(OutputQuery::default());
        assert_eq!(snapshot.stdout, "line 3\nline 4\nline 5\nline 6\nline 7");
    }

    #[test]
    fn output_split_skips_empty_segments() {
        let mut tracker = StateTracker::default();
        tracker.push_output(OutputCategory::Stdout, "a\r\n\r\nb\n", 1);
        let snapshot = tracker.query_output(OutputQuery::default());
        assert_eq!(snapshot.stdout, "a\nb");
    }

    #[test]
    fn output_query_filters_by_since_and_max_lines() {
        let mut tracker = StateTracker::default();
        tracker.push_output(OutputCategory::Stdout, "old", 100);
        tracker.push_output(OutputCategory::Console, "console line", 200);
        tracker.push_output(OutputCategory::Stderr, "oops", 300);
        tracker.push_output(OutputCategory::Stdout, "new", 400);

        let since = tracker.query_output(OutputQuery {
            since: Some(100),
            max_lines: None,
        });
        assert_eq!(since.stdout, "console line\nnew");
        assert_eq!(since.stderr, "oops");
        assert!(!since.truncated);

        let trimmed = tracker.query_output(OutputQuery {
            since: None,
            max_lines: Some(2),
        });
        assert_eq!(trimmed.stdout, "new");
        assert_eq!(trimmed.stderr, "oops");
        assert!(trimmed.truncated);
    }

    #[test]
    fn output_clears_on_terminated_and_inactive() {
        let mut tracker = StateTracker::default();
        tracker.begin_initializing();
        tracker.mark_running();
        tracker.push_output(OutputCategory::Stdout, "hello", 1);
        assert!(tracker.on_terminated());
        assert_eq!(tracker.output_len(), 0);

        tracker.mark_inactive();
        tracker.begin_initializing();
        tracker.mark_running();
        tracker.push_output(OutputCategory::Stdout, "hello", 1);
        tracker.mark_inactive();
        assert_eq!(tracker.output_len(), 0);
    }
}

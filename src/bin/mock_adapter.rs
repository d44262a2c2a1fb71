//! Scripted DAP adapter speaking Content-Length framed JSON over stdio.
//!
//! Used by the integration suite and for local experiments against the
//! backend without a real debugger. The adapter simulates a single-threaded
//! debuggee: it stops at the first configured breakpoint, advances one line
//! per step and records every request it receives. The request log can be
//! fetched in-band through `evaluate("__requests")`, and
//! `evaluate("__crash:<code>")` makes the process die with that exit code.

use anyhow::{Context, anyhow};
use clap::Parser;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read, Stdin, Stdout, Write};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Sleep this long before answering each request (timeout testing).
    #[clap(long)]
    delay_ms: Option<u64>,

    /// Stop with reason `entry` right after configurationDone even without
    /// breakpoints (same effect as `stopOnEntry` in the launch config).
    #[clap(long)]
    stop_on_entry: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    MockAdapter::new(args).run()
}

struct MockAdapter {
    args: Args,
    reader: BufReader<Stdin>,
    writer: Stdout,
    next_seq: i64,
    program: Option<String>,
    stop_on_entry: bool,
    /// path → breakpoint lines, as most recently reconciled.
    breakpoints: BTreeMap<String, Vec<i64>>,
    current_path: Option<String>,
    current_line: i64,
    request_log: Vec<Value>,
}

impl MockAdapter {
    fn new(args: Args) -> Self {
        let stop_on_entry = args.stop_on_entry;
        MockAdapter {
            args,
            reader: BufReader::new(std::io::stdin()),
            writer: std::io::stdout(),
            next_seq: 1,
            program: None,
            stop_on_entry,
            breakpoints: BTreeMap::new(),
            current_path: None,
            current_line: 1,
            request_log: Vec::new(),
        }
    }

    fn run(&mut self) -> anyhow::Result<()> {
        loop {
            let request = match self.read_message() {
                Ok(request) => request,
                Err(_) => return Ok(()),
            };
            let seq = request.get("seq").and_then(Value::as_i64).unwrap_or(0);
            let command = request
                .get("command")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let arguments = request.get("arguments").cloned().unwrap_or(Value::Null);

            self.request_log.push(json!({
                "command": command,
                "arguments": arguments,
            }));

            if let Some(delay) = self.args.delay_ms {
                std::thread::sleep(Duration::from_millis(delay));
            }

            log::debug!("mock-adapter handling `{command}`");
            if !self.handle(seq, &command, &arguments)? {
                return Ok(());
            }
        }
    }

    /// Returns false when the session is over and the process should exit.
    fn handle(&mut self, seq: i64, command: &str, arguments: &Value) -> anyhow::Result<bool> {
        match command {
            "initialize" => {
                self.respond(
                    seq,
                    command,
                    json!({
                        "supportsConfigurationDoneRequest": true,
                        "supportsFunctionBreakpoints": true,
                        "supportsConditionalBreakpoints": true,
                    }),
                )?;
            }
            "launch" | "attach" => {
                self.program = arguments
                    .get("program")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                if arguments
                    .get("stopOnEntry")
                    .and_then(Value::as_bool)
                    .unwrap_or(false)
                {
                    self.stop_on_entry = true;
                }
                // Deliberately ahead of the launch response: clients must arm
                // their `initialized` waiter before launching.
                self.send_event("initialized", Value::Null)?;
                self.respond(seq, command, Value::Null)?;
            }
            "setBreakpoints" => {
                let path = arguments
                    .pointer("/source/path")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let lines: Vec<i64> = arguments
                    .get("breakpoints")
                    .and_then(Value::as_array)
                    .map(|breakpoints| {
                        breakpoints
                            .iter()
                            .filter_map(|bp| bp.get("line").and_then(Value::as_i64))
                            .collect()
                    })
                    .unwrap_or_default();
                let verified: Vec<Value> = lines
                    .iter()
                    .enumerate()
                    .map(|(index, line)| {
                        json!({"id": index + 1, "verified": true, "line": line})
                    })
                    .collect();
                if lines.is_empty() {
                    self.breakpoints.remove(&path);
                } else {
                    self.breakpoints.insert(path, lines);
                }
                self.respond(seq, command, json!({"breakpoints": verified}))?;
            }
            "setFunctionBreakpoints" => {
                let count = arguments
                    .get("breakpoints")
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                let verified: Vec<Value> =
                    (0..count).map(|_| json!({"verified": true})).collect();
                self.respond(seq, command, json!({"breakpoints": verified}))?;
            }
            "configurationDone" => {
                self.respond(seq, command, Value::Null)?;
                if let Some((path, line)) = self.first_breakpoint() {
                    self.current_path = Some(path);
                    self.current_line = line;
                    self.stop("breakpoint")?;
                } else if self.stop_on_entry {
                    self.current_path = self.program.clone();
                    self.current_line = 1;
                    self.stop("entry")?;
                } else {
                    self.finish_program()?;
                }
            }
            "threads" => {
                self.respond(seq, command, json!({"threads": [{"id": 1, "name": "main"}]}))?;
            }
            "stackTrace" => {
                // Column deliberately omitted: clients default it to 1.
                let frame = json!({
                    "id": 1000 + self.current_line,
                    "name": "main",
                    "line": self.current_line,
                    "source": self.current_path.as_ref().map(|path| json!({"path": path})),
                });
                self.respond(
                    seq,
                    command,
                    json!({"stackFrames": [frame], "totalFrames": 1}),
                )?;
            }
            "scopes" => {
                self.respond(
                    seq,
                    command,
                    json!({"scopes": [
                        {"name": "Locals", "variablesReference": 1001, "expensive": false},
                        {"name": "Globals", "variablesReference": 1002, "expensive": true},
                    ]}),
                )?;
            }
            "variables" => {
                let reference = arguments
                    .get("variablesReference")
                    .and_then(Value::as_i64)
                    .unwrap_or(0);
                let variables = match reference {
                    1001 => json!([
                        {"name": "x", "value": "42", "type": "int", "variablesReference": 0},
                        {"name": "flag", "value": "True", "type": "bool", "variablesReference": 0},
                    ]),
                    1002 => json!([
                        {"name": "__name__", "value": "'__main__'", "type": "str", "variablesReference": 0},
                    ]),
                    _ => json!([]),
                };
                self.respond(seq, command, json!({"variables": variables}))?;
            }
            "evaluate" => {
                let expression = arguments
                    .get("expression")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if let Some(code) = expression.strip_prefix("__crash:") {
                    let code = code.parse::<i32>().unwrap_or(1);
                    std::process::exit(code);
                }
                let result = if expression == "__requests" {
                    serde_json::to_string(&self.request_log)?
                } else {
                    format!("<{expression}>")
                };
                self.respond(
                    seq,
                    command,
                    json!({"result": result, "type": "str", "variablesReference": 0}),
                )?;
            }
            "next" | "stepIn" | "stepOut" => {
                self.respond(seq, command, Value::Null)?;
                self.current_line += 1;
                self.stop("step")?;
            }
            "continue" => {
                self.respond(seq, command, json!({"allThreadsContinued": true}))?;
                match self.next_breakpoint_after(self.current_line) {
                    Some(line) => {
                        self.current_line = line;
                        self.stop("breakpoint")?;
                    }
                    None => self.finish_program()?,
                }
            }
            "pause" => {
                self.respond(seq, command, Value::Null)?;
                self.stop("pause")?;
            }
            "disconnect" => {
                self.respond(seq, command, Value::Null)?;
                return Ok(false);
            }
            "terminate" => {
                self.respond(seq, command, Value::Null)?;
                self.finish_program()?;
            }
            other => {
                self.fail(seq, other, &format!("unsupported request: {other}"))?;
            }
        }
        Ok(true)
    }

    fn first_breakpoint(&self) -> Option<(String, i64)> {
        self.breakpoints
            .iter()
            .next()
            .and_then(|(path, lines)| lines.first().map(|line| (path.clone(), *line)))
    }

    fn next_breakpoint_after(&self, line: i64) -> Option<i64> {
        let path = self.current_path.as_ref()?;
        self.breakpoints
            .get(path)?
            .iter()
            .copied()
            .filter(|candidate| *candidate > line)
            .min()
    }

    fn stop(&mut self, reason: &str) -> anyhow::Result<()> {
        self.send_event(
            "stopped",
            json!({"reason": reason, "threadId": 1, "allThreadsStopped": true}),
        )
    }

    fn finish_program(&mut self) -> anyhow::Result<()> {
        self.send_event(
            "output",
            json!({"category": "stdout", "output": "mock program finished\n"}),
        )?;
        self.send_event("exited", json!({"exitCode": 0}))?;
        self.send_event("terminated", Value::Null)
    }

    // --------------------------------- framing ---------------------------------------------------

    fn read_message(&mut self) -> anyhow::Result<Value> {
        let mut content_length: Option<usize> = None;
        loop {
            let mut line = String::new();
            let read_n = self.reader.read_line(&mut line)?;
            if read_n == 0 {
                return Err(anyhow!("DAP connection closed"));
            }
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                break;
            }
            if let Some(value) = line.strip_prefix("Content-Length:") {
                content_length = Some(value.trim().parse()?);
            }
        }

        let len = content_length.ok_or_else(|| anyhow!("Missing Content-Length header"))?;
        let mut buf = vec![0u8; len];
        self.reader.read_exact(&mut buf)?;
        let msg: Value = serde_json::from_slice(&buf)?;
        Ok(msg)
    }

    fn write_message(&mut self, message: &Value) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(message)?;
        write!(self.writer, "Content-Length: {}\r\n\r\n", payload.len())?;
        self.writer.write_all(&payload)?;
        self.writer.flush().context("flush DAP output")?;
        Ok(())
    }

    fn respond(&mut self, request_seq: i64, command: &str, body: Value) -> anyhow::Result<()> {
        let seq = self.bump_seq();
        let mut response = json!({
            "seq": seq,
            "type": "response",
            "request_seq": request_seq,
            "success": true,
            "command": command,
        });
        if !body.is_null() {
            response["body"] = body;
        }
        self.write_message(&response)
    }

    fn fail(&mut self, request_seq: i64, command: &str, message: &str) -> anyhow::Result<()> {
        let seq = self.bump_seq();
        self.write_message(&json!({
            "seq": seq,
            "type": "response",
            "request_seq": request_seq,
            "success": false,
            "command": command,
            "message": message,
        }))
    }

    fn send_event(&mut self, event: &str, body: Value) -> anyhow::Result<()> {
        let seq = self.bump_seq();
        let mut message = json!({"seq": seq, "type": "event", "event": event});
        if !body.is_null() {
            message["body"] = body;
        }
        self.write_message(&message)
    }

    fn bump_seq(&mut self) -> i64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

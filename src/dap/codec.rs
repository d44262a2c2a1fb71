//! Content-Length framing for DAP messages.
//!
//! ```text
//! Content-Length: <decimal>\r\n\r\n<UTF-8 JSON body of exactly that length>
//! ```
//!
//! The decoder is a push-style state machine over an accumulation buffer so
//! it is insensitive to how the transport chops the byte stream: coalesced
//! messages, a message split across arbitrarily many reads, and headers and
//! bodies interleaved across reads all decode identically.

use crate::dap::protocol::Incoming;
use bytes::{Buf, BytesMut};
use serde::Serialize;

const HEADER_SEPARATOR: &[u8] = b"\r\n\r\n";

/// Frame an outbound message.
pub fn encode<T: Serialize>(message: &T) -> serde_json::Result<Vec<u8>> {
    let payload = serde_json::to_vec(message)?;
    let mut framed = Vec::with_capacity(payload.len() + 32);
    framed.extend_from_slice(format!("Content-Length: {}\r\n\r\n", payload.len()).as_bytes());
    framed.extend_from_slice(&payload);
    Ok(framed)
}

enum DecodeState {
    /// Scanning for the `\r\n\r\n` header terminator.
    SeekingHeader,
    /// Waiting until `len` body bytes are buffered.
    ReadingBody { len: usize },
}

/// Streaming frame decoder. Feed bytes with [`FrameDecoder::extend`], drain
/// messages with [`FrameDecoder::decode`].
pub struct FrameDecoder {
    buf: BytesMut,
    state: DecodeState,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        FrameDecoder {
            buf: BytesMut::with_capacity(8 * 1024),
            state: DecodeState::SeekingHeader,
        }
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Next complete frame, or `None` until more bytes arrive. A frame whose
    /// body is not valid JSON yields `Some(Err(..))` and the stream continues
    /// with the following frame; a header block without a usable
    /// `Content-Length` is discarded entirely.
    pub fn decode(&mut self) -> Option<Result<Incoming, serde_json::Error>> {
        loop {
            match self.state {
                DecodeState::SeekingHeader => {
                    let separator = find(&self.buf, HEADER_SEPARATOR)?;
                    let header = self.buf.split_to(separator);
                    self.buf.advance(HEADER_SEPARATOR.len());
                    match content_length(&header) {
                        Some(len) => self.state = DecodeState::ReadingBody { len },
                        None => {
                            // One malformed frame never poisons the stream.
                            log::warn!(
                                target: "dap",
                                "discarding header block without Content-Length: {:?}",
                                String::from_utf8_lossy(&header)
                            );
                        }
                    }
                }
                DecodeState::ReadingBody { len } => {
                    if self.buf.len() < len {
                        return None;
                    }
                    let body = self.buf.split_to(len);
                    self.state = DecodeState::SeekingHeader;
                    return Some(serde_json::from_slice(&body));
                }
            }
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Extract `Content-Length` from a header region. Header names are
/// case-insensitive; unknown headers are permitted and ignored.
fn content_length(header: &[u8]) -> Option<usize> {
    let header = std::str::from_utf8(header).ok()?;
    for line in header.split("\r\n") {
        if let Some((name, value)) = line.split_once(':')
            && name.trim().eq_ignore_ascii_case("Content-Length")
        {
            return value.trim().parse().ok();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(body: &str) -> Vec<u8> {
        format!("Content-Length: {}\r\n\r\n{}", body.len(), body).into_bytes()
    }

    fn response(seq: i64, command: &str) -> String {
        json!({
            "seq": seq, "type": "response", "request_seq": seq,
            "success": true, "command": command
        })
        .to_string()
    }

    fn drain(decoder: &mut FrameDecoder) -> Vec<Incoming> {
        let mut out = Vec::new();
        while let Some(frame) = decoder.decode() {
            out.push(frame.expect("valid frame"));
        }
        out
    }

    fn commands(messages: &[Incoming]) -> Vec<String> {
        messages
            .iter()
            .map(|msg| match msg {
                Incoming::Response(r) => r.command.clone(),
                Incoming::Event(e) => e.event.clone(),
                Incoming::Request(r) => r.command.clone(),
            })
            .collect()
    }

    #[test]
    fn every_byte_partition_yields_the_same_messages() {
        let mut stream = Vec::new();
        stream.extend(frame(&response(1, "initialize")));
        stream.extend(frame(&response(2, "launch")));
        stream.extend(frame(
            &json!({"seq": 3, "type": "event", "event": "stopped"}).to_string(),
        ));

        let mut whole = FrameDecoder::new();
        whole.extend(&stream);
        let expected = commands(&drain(&mut whole));
        assert_eq!(expected, vec!["initialize", "launch", "stopped"]);

        // One byte at a time.
        let mut bytewise = FrameDecoder::new();
        let mut seen = Vec::new();
        for byte in &stream {
            bytewise.extend(std::slice::from_ref(byte));
            seen.extend(drain(&mut bytewise));
        }
        assert_eq!(commands(&seen), expected);

        // Every split point of the stream into two reads.
        for split in 0..=stream.len() {
            let mut decoder = FrameDecoder::new();
            decoder.extend(&stream[..split]);
            let mut seen = drain(&mut decoder);
            decoder.extend(&stream[split..]);
            seen.extend(drain(&mut decoder));
            assert_eq!(commands(&seen), expected, "split at {split}");
        }
    }

    #[test]
    fn coalesced_messages_decode_in_order() {
        let mut decoder = FrameDecoder::new();
        let mut both = frame(&response(1, "initialize"));
        both.extend(frame(&response(2, "launch")));
        decoder.extend(&both);
        assert_eq!(commands(&drain(&mut decoder)), vec!["initialize", "launch"]);
    }

    #[test]
    fn body_length_is_exact() {
        let body = response(1, "initialize");
        let mut decoder = FrameDecoder::new();

        // One byte short: blocks.
        let framed = frame(&body);
        decoder.extend(&framed[..framed.len() - 1]);
        assert!(decoder.decode().is_none());

        // The final byte completes the frame.
        decoder.extend(&framed[framed.len() - 1..]);
        assert_eq!(commands(&drain(&mut decoder)), vec!["initialize"]);

        // One byte past the declared length belongs to the next header.
        let mut decoder = FrameDecoder::new();
        let mut stream = frame(&body);
        stream.extend(b"C");
        decoder.extend(&stream);
        assert_eq!(commands(&drain(&mut decoder)), vec!["initialize"]);
        stream.clear();
        decoder.extend(format!("ontent-Length: {}\r\n\r\n{}", body.len(), body).as_bytes());
        assert_eq!(commands(&drain(&mut decoder)), vec!["initialize"]);
    }

    #[test]
    fn extra_headers_are_ignored_and_names_are_case_insensitive() {
        let body = response(1, "threads");
        let framed = format!(
            "Content-Type: application/vscode-jsonrpc\r\ncontent-length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        let mut decoder = FrameDecoder::new();
        decoder.extend(framed.as_bytes());
        assert_eq!(commands(&drain(&mut decoder)), vec!["threads"]);
    }

    #[test]
    fn malformed_header_does_not_poison_the_stream() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(b"Garbage-Header: nonsense\r\n\r\n");
        decoder.extend(&frame(&response(4, "scopes")));
        assert_eq!(commands(&drain(&mut decoder)), vec!["scopes"]);
    }

    #[test]
    fn invalid_json_body_is_an_error_but_decoding_continues() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(&frame("{not json"));
        decoder.extend(&frame(&response(5, "variables")));

        assert!(decoder.decode().unwrap().is_err());
        assert_eq!(commands(&drain(&mut decoder)), vec!["variables"]);
    }

    #[test]
    fn encode_round_trips() {
        let message = json!({
            "seq": 1, "type": "request", "command": "initialize",
            "arguments": {"adapterID": "debugmcp"}
        });
        let bytes = encode(&message).unwrap();
        let mut decoder = FrameDecoder::new();
        decoder.extend(&bytes);
        let Incoming::Request(decoded) = decoder.decode().unwrap().unwrap() else {
            panic!("expected request envelope");
        };
        assert_eq!(decoded.command, "initialize");
        assert_eq!(decoded.arguments, json!({"adapterID": "debugmcp"}));
        assert!(decoder.decode().is_none());
    }
}

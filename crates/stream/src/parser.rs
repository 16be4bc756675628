// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Incremental line-delimited JSON parser.
//!
//! One JSON object per line; objects may span lines when a value contains
//! embedded newlines, so framing tracks brace/bracket depth outside
//! strings (string-escape aware) and only treats a newline at depth zero
//! as an object boundary. Unparseable input becomes a synthetic `error`
//! message and the parser resynchronizes at the next newline.
//!
//! The parser is push-based and never blocks: `feed` returns every
//! message completed by the given bytes, `finish` produces the terminal
//! message for the stream. The scratch buffer is reused across objects;
//! emitted messages own their bytes.

use herd_core::{Message, MessageKind, SessionId};
use serde_json::{json, Value};

/// How the underlying byte stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// Reader hit EOF; exit details from the process waiter.
    Eof { exit_code: Option<i32>, signal: Option<i32> },
    /// Reader failed with a non-EOF I/O error.
    ReadError(String),
}

/// Parser tunables.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Longest accepted object in bytes; anything longer becomes a
    /// synthetic `error` and input is discarded until the next newline.
    pub max_line_bytes: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self { max_line_bytes: 1024 * 1024 }
    }
}

/// Streaming parser for one agent's stdout.
///
/// Restartable only by constructing a new parser for a new process.
pub struct StreamParser {
    session_id: SessionId,
    config: ParserConfig,
    next_seq: u64,
    scratch: Vec<u8>,
    depth: i32,
    in_string: bool,
    escaped: bool,
    /// Discarding an oversized or post-error line until the next newline.
    resyncing: bool,
    saw_complete: bool,
    closed: bool,
}

impl StreamParser {
    pub fn new(session_id: SessionId, config: ParserConfig) -> Self {
        Self {
            session_id,
            config,
            next_seq: 1,
            scratch: Vec::with_capacity(4096),
            depth: 0,
            in_string: false,
            escaped: false,
            resyncing: false,
            saw_complete: false,
            closed: false,
        }
    }

    /// Sequence number the next emitted message will carry.
    pub fn next_sequence_no(&self) -> u64 {
        self.next_seq
    }

    /// Frame a stderr line as a `system` message with the next sequence
    /// number, keeping stdout and stderr in one ordered stream.
    pub fn frame_stderr_line(&mut self, line: &str, now_ms: u64) -> Message {
        let seq = self.take_seq();
        Message::system_line(self.session_id, seq, now_ms, line)
    }

    /// Consume a chunk of stdout bytes, returning every completed message.
    pub fn feed(&mut self, bytes: &[u8], now_ms: u64) -> Vec<Message> {
        let mut out = Vec::new();
        if self.closed {
            return out;
        }
        for &b in bytes {
            if self.resyncing {
                if b == b'\n' {
                    self.reset_frame();
                }
                continue;
            }

            if b == b'\n' && self.depth <= 0 && !self.in_string {
                if !self.scratch.is_empty() && self.scratch.iter().any(|c| !c.is_ascii_whitespace())
                {
                    out.push(self.take_object(now_ms));
                }
                self.reset_frame();
                continue;
            }

            self.scratch.push(b);
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == b'"' {
                    self.in_string = false;
                }
            } else {
                match b {
                    b'"' => self.in_string = true,
                    b'{' | b'[' => self.depth += 1,
                    b'}' | b']' => self.depth -= 1,
                    _ => {}
                }
            }

            if self.scratch.len() > self.config.max_line_bytes {
                out.push(self.oversize_error(now_ms));
                self.scratch.clear();
                self.resyncing = true;
            }
        }
        out
    }

    /// Close the stream, emitting the terminal message.
    ///
    /// EOF after a clean exit yields a synthetic `complete` unless the
    /// agent already sent its own; an abnormal exit or read error yields
    /// a synthetic `error`. Subsequent calls return `None`.
    pub fn finish(&mut self, end: StreamEnd, now_ms: u64) -> Vec<Message> {
        let mut out = Vec::new();
        if self.closed {
            return out;
        }
        self.closed = true;

        // A partial object with no trailing newline is unrecoverable.
        if !self.resyncing
            && self.scratch.iter().any(|c| !c.is_ascii_whitespace())
        {
            let raw = String::from_utf8_lossy(&self.scratch).into_owned();
            let seq = self.take_seq();
            out.push(Message::synthetic_error(
                self.session_id,
                seq,
                now_ms,
                "truncated_line",
                json!({ "raw": raw }),
            ));
            self.scratch.clear();
        }

        match end {
            StreamEnd::Eof { exit_code, signal } => {
                let abnormal = exit_code.map(|c| c != 0).unwrap_or(true);
                if abnormal {
                    let seq = self.take_seq();
                    out.push(Message::synthetic_error(
                        self.session_id,
                        seq,
                        now_ms,
                        "agent_exited",
                        json!({ "code": exit_code, "signal": signal }),
                    ));
                } else if !self.saw_complete {
                    let seq = self.take_seq();
                    out.push(Message::synthetic_complete(self.session_id, seq, now_ms));
                }
            }
            StreamEnd::ReadError(message) => {
                let seq = self.take_seq();
                out.push(Message::synthetic_error(
                    self.session_id,
                    seq,
                    now_ms,
                    "read_error",
                    json!({ "message": message }),
                ));
            }
        }
        out
    }

    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn reset_frame(&mut self) {
        self.scratch.clear();
        self.depth = 0;
        self.in_string = false;
        self.escaped = false;
        self.resyncing = false;
    }

    fn take_object(&mut self, now_ms: u64) -> Message {
        let raw_len = self.scratch.len();
        let seq = self.take_seq();
        match serde_json::from_slice::<Value>(&self.scratch) {
            Ok(value) if value.is_object() => {
                let msg = Message::from_wire(self.session_id, seq, now_ms, value, raw_len);
                if msg.kind == MessageKind::Complete {
                    self.saw_complete = true;
                }
                msg
            }
            Ok(_) | Err(_) => {
                let raw = String::from_utf8_lossy(&self.scratch).into_owned();
                Message::synthetic_error(
                    self.session_id,
                    seq,
                    now_ms,
                    "unparseable",
                    json!({ "raw": raw }),
                )
            }
        }
    }

    fn oversize_error(&mut self, now_ms: u64) -> Message {
        let seq = self.take_seq();
        let prefix = String::from_utf8_lossy(&self.scratch[..1024.min(self.scratch.len())])
            .into_owned();
        Message::synthetic_error(
            self.session_id,
            seq,
            now_ms,
            "line_too_long",
            json!({
                "raw": prefix,
                "truncated": true,
                "limit": self.config.max_line_bytes,
            }),
        )
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;

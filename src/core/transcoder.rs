//! Stream transcoder: Ollama NDJSON in, SSE events out.
//!
//! Each line of the upstream body is one JSON object:
//! ```text
//! {"model":"tinyllama:latest","response":"Hel","done":false}
//! {"model":"tinyllama:latest","response":"lo","done":false}
//! {"model":"tinyllama:latest","response":"","done":true,"done_reason":"stop"}
//! ```
//! Every transcoded stream ends with exactly one [`StreamEvent::Done`], whether the upstream
//! finished cleanly or not.

use crate::infrastructure::entities::UpstreamChunk;
use async_stream::stream;
use futures_util::{Stream, StreamExt};
use log::{debug, error};
use regex::Regex;
use std::fmt::Display;
use std::pin::pin;
use std::sync::LazyLock;

pub const DONE_SENTINEL: &str = "[DONE]";

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").expect("ANSI pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Content(String),
    Error(String),
    Done,
}

impl StreamEvent {
    /// The `data:` payload carried by this event.
    pub fn payload(&self) -> &str {
        match self {
            StreamEvent::Content(text) => text,
            StreamEvent::Error(message) => message,
            StreamEvent::Done => DONE_SENTINEL,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done)
    }
}

/// Events reported when the daemon cannot be reached or fails mid-stream.
pub fn upstream_failure(err: impl Display) -> Vec<StreamEvent> {
    error!("Ollama API error: {err}");
    vec![
        StreamEvent::Error(format!("Ollama API error: {err}")),
        StreamEvent::Done,
    ]
}

fn parse_failure(err: impl Display) -> Vec<StreamEvent> {
    error!("JSON decode error: {err}");
    vec![
        StreamEvent::Error(format!("Error parsing response: {err}")),
        StreamEvent::Done,
    ]
}

/// Transcodes a single upstream line.
///
/// Blank lines yield nothing. A line that is not valid JSON yields an error followed by
/// [`StreamEvent::Done`].
pub fn transcode_line(line: &str) -> Vec<StreamEvent> {
    let line = line.trim();
    if line.is_empty() {
        return Vec::new();
    }

    let chunk: UpstreamChunk = match serde_json::from_str(line) {
        Ok(chunk) => chunk,
        Err(e) => return parse_failure(e),
    };

    let mut events = Vec::new();
    if let Some(raw) = chunk.response.as_deref() {
        let cleaned = clean_fragment(raw);
        if !cleaned.trim().is_empty() {
            debug!("Ollama output: {cleaned}");
            events.push(StreamEvent::Content(cleaned));
        }
    }
    if chunk.is_done() {
        events.push(StreamEvent::Done);
    }
    events
}

fn transcode_bytes(line: &[u8]) -> Vec<StreamEvent> {
    match std::str::from_utf8(line) {
        Ok(text) => transcode_line(text),
        Err(e) => parse_failure(e),
    }
}

/// Transcodes a whole upstream body.
///
/// The returned stream stops after the first terminal event and drops `upstream` with it.
pub fn transcode<S, B, E>(upstream: S) -> impl Stream<Item = StreamEvent> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    stream! {
        let mut lines = pin!(split_lines(upstream));

        while let Some(line) = lines.next().await {
            let events = match line {
                Ok(line) => transcode_bytes(&line),
                Err(e) => upstream_failure(e),
            };
            for event in events {
                let terminal = event.is_terminal();
                yield event;
                if terminal {
                    return;
                }
            }
        }

        for event in upstream_failure("stream ended before completion") {
            yield event;
        }
    }
}

/// Reassembles newline-terminated lines from arbitrarily split byte chunks.
///
/// A trailing line without a newline is emitted when `upstream` ends. An upstream error ends
/// the stream after being passed through.
fn split_lines<S, B, E>(upstream: S) -> impl Stream<Item = Result<Vec<u8>, E>> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Send + 'static,
{
    stream! {
        let mut upstream = pin!(upstream);
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = upstream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            buffer.extend_from_slice(chunk.as_ref());
            while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = buffer.drain(..=newline).collect();
                line.pop();
                yield Ok(line);
            }
        }

        if !buffer.is_empty() {
            yield Ok(buffer);
        }
    }
}

/// Decodes escape sequences, then strips ANSI sequences and carriage returns.
pub fn clean_fragment(raw: &str) -> String {
    let decoded = decode_escapes(raw);
    let stripped = ANSI_ESCAPE.replace_all(&decoded, "");

    stripped
        .replace("\r\n", "\n")
        .replace(['\r', '\u{1b}'], "")
}

/// Resolves `\uXXXX` (with surrogate pairs), `\UXXXXXXXX`, `\xHH` and the common single
/// character escapes. Anything else after a backslash is kept verbatim.
pub fn decode_escapes(input: &str) -> String {
    if !input.contains('\\') {
        return input.to_owned();
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('\\') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let (decoded, consumed) = decode_one(tail);
        match decoded {
            Some(c) => out.push(c),
            None => out.push_str(&tail[..consumed]),
        }
        rest = &tail[consumed..];
    }
    out.push_str(rest);
    out
}

/// `tail` starts with a backslash. Returns the decoded character, if any, and how many bytes
/// of `tail` were consumed.
fn decode_one(tail: &str) -> (Option<char>, usize) {
    let Some(kind) = tail[1..].chars().next() else {
        return (None, 1);
    };

    match kind {
        'n' => (Some('\n'), 2),
        't' => (Some('\t'), 2),
        'r' => (Some('\r'), 2),
        '\\' => (Some('\\'), 2),
        '\'' => (Some('\''), 2),
        '"' => (Some('"'), 2),
        'x' => fixed_hex(tail, 2),
        'U' => fixed_hex(tail, 8),
        'u' => utf16_escape(tail),
        other => (None, 1 + other.len_utf8()),
    }
}

fn hex_at(tail: &str, start: usize, digits: usize) -> Option<u32> {
    tail.get(start..start + digits)
        .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
        .and_then(|hex| u32::from_str_radix(hex, 16).ok())
}

fn fixed_hex(tail: &str, digits: usize) -> (Option<char>, usize) {
    match hex_at(tail, 2, digits).and_then(char::from_u32) {
        Some(c) => (Some(c), 2 + digits),
        None => (None, 2),
    }
}

fn utf16_escape(tail: &str) -> (Option<char>, usize) {
    let Some(unit) = hex_at(tail, 2, 4) else {
        return (None, 2);
    };

    if (0xD800..0xDC00).contains(&unit) {
        let low = (tail.get(6..8) == Some("\\u"))
            .then(|| hex_at(tail, 8, 4))
            .flatten()
            .filter(|low| (0xDC00..0xE000).contains(low));
        return match low {
            Some(low) => (
                char::from_u32(0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00)),
                12,
            ),
            None => (None, 2),
        };
    }

    (char::from_u32(unit), 6)
}

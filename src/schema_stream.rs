//! Streamed schema generation and its tagged-stream tokenizer.
//!
//! `generate-schema-perfect` streams progress before the answer:
//!
//! ```text
//! <processing>
//! fetching page
//! </processing>
//! <think>
//! .
//! choosing Article over BlogPosting
//! </think>
//! {"@context":"https://schema.org","@type":"Article",...}
//! ```
//!
//! Sections can repeat and interleave. Everything outside them is the JSON
//! document. Chunk boundaries are arbitrary, so markers and UTF-8 sequences
//! may arrive split; [`SchemaStream`] holds back any tail that could still
//! become one.

use std::fmt;
use std::io::{self, Read};
use std::time::Duration;

use serde_json::Value;

use crate::backend::{self, Backend, BackendError, excerpt};
use crate::model::SchemaRequest;

pub const FUNCTION: &str = "generate-schema-perfect";

/// Longest silence tolerated while the schema streams in.
pub const TIMEOUT: Duration = Duration::from_secs(120);

const READ_BUF: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Processing,
    Think,
}

impl Section {
    const ALL: [Self; 2] = [Self::Processing, Self::Think];

    pub const fn open(self) -> &'static str {
        match self {
            Self::Processing => "<processing>",
            Self::Think => "<think>",
        }
    }

    pub const fn close(self) -> &'static str {
        match self {
            Self::Processing => "</processing>",
            Self::Think => "</think>",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Processing => "processing",
            Self::Think => "think",
        })
    }
}

/// What the tokenizer recognised in a chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Enter(Section),
    /// A complete, trimmed, non-empty line inside a section.
    Line(Section, String),
    Exit(Section),
    /// Text outside any section; part of the final document.
    Body(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("stream ended inside a <{section}> section\n{excerpt}")]
    Unterminated { section: Section, excerpt: String },

    #[error("schema is not valid JSON: {source}\n{excerpt}")]
    InvalidJson {
        source: serde_json::Error,
        excerpt: String,
    },
}

/// Incremental tokenizer for the tagged stream.
#[derive(Debug, Default)]
pub struct SchemaStream {
    section: Option<Section>,
    /// Text not yet classified; may end in a partial marker.
    pending: String,
    /// Partial line inside the current section.
    line: String,
    body: String,
    /// Trailing bytes of an incomplete UTF-8 sequence.
    carry: Vec<u8>,
}

impl SchemaStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes. Incomplete UTF-8 at the end is kept for the next call;
    /// invalid sequences become U+FFFD.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        self.carry.extend_from_slice(bytes);
        let mut text = String::new();
        loop {
            let (valid_up_to, error_len) = match std::str::from_utf8(&self.carry) {
                Ok(_) => (self.carry.len(), None),
                Err(e) => (e.valid_up_to(), e.error_len()),
            };
            text.push_str(&String::from_utf8_lossy(&self.carry[..valid_up_to]));
            match error_len {
                Some(len) => {
                    text.push(char::REPLACEMENT_CHARACTER);
                    self.carry.drain(..valid_up_to + len);
                }
                None => {
                    self.carry.drain(..valid_up_to);
                    break;
                }
            }
        }
        self.feed(&text)
    }

    /// Feed decoded text.
    pub fn feed(&mut self, chunk: &str) -> Vec<StreamEvent> {
        self.pending.push_str(chunk);
        let mut events = Vec::new();
        loop {
            match self.section {
                None => {
                    if let Some((at, section)) = find_open(&self.pending) {
                        let before: String = self.pending.drain(..at).collect();
                        self.push_body(before, &mut events);
                        self.pending.drain(..section.open().len());
                        self.section = Some(section);
                        events.push(StreamEvent::Enter(section));
                    } else {
                        let opens = Section::ALL.map(Section::open);
                        let take = self.pending.len() - held_suffix(&self.pending, &opens);
                        let text: String = self.pending.drain(..take).collect();
                        self.push_body(text, &mut events);
                        break;
                    }
                }
                Some(section) => {
                    let close = section.close();
                    if let Some(at) = self.pending.find(close) {
                        let content: String = self.pending.drain(..at).collect();
                        self.pending.drain(..close.len());
                        self.line.push_str(&content);
                        self.flush_lines(section, &mut events);
                        let rest = std::mem::take(&mut self.line);
                        push_line(section, &rest, &mut events);
                        self.section = None;
                        events.push(StreamEvent::Exit(section));
                    } else {
                        let take = self.pending.len() - held_suffix(&self.pending, &[close]);
                        let content: String = self.pending.drain(..take).collect();
                        self.line.push_str(&content);
                        self.flush_lines(section, &mut events);
                        break;
                    }
                }
            }
        }
        events
    }

    /// End of stream: parse everything outside the sections as one JSON document.
    pub fn finish(mut self) -> Result<Value, StreamError> {
        if !self.carry.is_empty() {
            let tail = String::from_utf8_lossy(&std::mem::take(&mut self.carry)).into_owned();
            self.feed(&tail);
        }

        if let Some(section) = self.section {
            let mut rest = std::mem::take(&mut self.line);
            rest.push_str(&self.pending);
            return Err(StreamError::Unterminated {
                section,
                excerpt: excerpt(rest.trim()),
            });
        }

        self.body.push_str(&self.pending);
        let document = self.body.trim();
        serde_json::from_str(document).map_err(|source| StreamError::InvalidJson {
            source,
            excerpt: excerpt(document),
        })
    }

    fn push_body(&mut self, text: String, events: &mut Vec<StreamEvent>) {
        if text.is_empty() {
            return;
        }
        self.body.push_str(&text);
        events.push(StreamEvent::Body(text));
    }

    fn flush_lines(&mut self, section: Section, events: &mut Vec<StreamEvent>) {
        while let Some(newline) = self.line.find('\n') {
            let line: String = self.line.drain(..=newline).collect();
            push_line(section, &line, events);
        }
    }
}

/// Emit a section line unless it is blank or a thinking heartbeat.
fn push_line(section: Section, raw: &str, events: &mut Vec<StreamEvent>) {
    let text = raw.trim();
    if text.is_empty() || (section == Section::Think && text == ".") {
        return;
    }
    events.push(StreamEvent::Line(section, text.to_string()));
}

/// The earliest opening marker in `text`.
fn find_open(text: &str) -> Option<(usize, Section)> {
    Section::ALL
        .into_iter()
        .filter_map(|s| text.find(s.open()).map(|at| (at, s)))
        .min_by_key(|(at, _)| *at)
}

/// Length of the longest tail of `text` that is a proper prefix of a marker.
fn held_suffix(text: &str, markers: &[&str]) -> usize {
    let longest = markers.iter().map(|m| m.len() - 1).max().unwrap_or(0);
    (1..=longest.min(text.len()))
        .rev()
        .find(|&k| {
            let start = text.len() - k;
            text.is_char_boundary(start) && markers.iter().any(|m| m.starts_with(&text[start..]))
        })
        .unwrap_or(0)
}

// ── Remote call ──

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("schema request failed: {0}")]
    Backend(#[from] BackendError),

    #[error("reading schema stream failed: {0}")]
    Read(#[source] io::Error),

    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// Stream a schema for `url`, reporting tokens as they arrive.
///
/// `timeout` bounds each wait for more bytes, not the whole stream.
pub fn fetch_schema(
    backend: &Backend,
    url: &str,
    timeout: Duration,
    mut on_event: impl FnMut(&StreamEvent),
) -> Result<Value, SchemaError> {
    let request = SchemaRequest { url: url.into() };
    let mut response = backend.stream_function(FUNCTION, &request, timeout)?;

    let mut stream = SchemaStream::new();
    let mut buf = [0u8; READ_BUF];
    loop {
        let n = match response.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if backend::read_timed_out(&e) => {
                return Err(BackendError::Timeout { after: timeout }.into());
            }
            Err(e) => return Err(SchemaError::Read(e)),
        };
        for event in stream.feed_bytes(&buf[..n]) {
            on_event(&event);
        }
    }
    Ok(stream.finish()?)
}

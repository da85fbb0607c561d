//! SSE delta decoding for streaming chat completions.
//! See ARCHITECTURE.md §6
//!
//! `SseDecoder` is the explicit decoder state: it buffers raw bytes,
//! splits complete `data:` frames on newlines, extracts
//! `choices[0].delta.content` from each, skips malformed frames, and
//! latches on the `[DONE]` sentinel. `DeltaStream` drives the decoder
//! over a response body as a finite, non-restartable sequence of text
//! deltas.

use std::collections::VecDeque;
use std::pin::Pin;

use futures_util::{Stream, StreamExt};

use crate::backend::LlmError;

/// One decoded SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A per-frame text delta (not cumulative).
    Delta(String),
    /// The `[DONE]` terminal sentinel.
    Done,
}

/// Line-buffered SSE frame decoder. Once the sentinel has been seen,
/// all further input is ignored.
///
/// The buffer holds raw bytes and only complete lines are decoded to
/// text: a multi-byte UTF-8 character split across two network chunks
/// stays in the buffer until its line is complete.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    finished: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed raw bytes, returning every event completed by this chunk
    /// in arrival order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        if self.finished {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            // Multi-byte sequences never contain a newline byte, so a
            // complete line is always valid at its chunk seams.
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim();

            let Some(data) = line.strip_prefix("data:") else {
                // Blank keep-alive lines and event/id fields carry no delta
                continue;
            };
            let data = data.trim_start();

            if data == "[DONE]" {
                self.finished = true;
                events.push(SseEvent::Done);
                break;
            }

            match serde_json::from_str::<serde_json::Value>(data) {
                Ok(frame) => {
                    if let Some(delta) = frame["choices"][0]["delta"]["content"].as_str() {
                        if !delta.is_empty() {
                            events.push(SseEvent::Delta(delta.to_string()));
                        }
                    }
                }
                Err(_) => {
                    // Malformed frame: skip, never abort the stream
                    tracing::debug!(frame = %data, "Skipping malformed SSE frame");
                }
            }
        }
        events
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, LlmError>> + Send>>;

/// A finite, non-restartable sequence of text deltas over a streaming
/// response body. Dropping it releases the underlying connection.
pub struct DeltaStream {
    body: ByteStream,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    exhausted: bool,
}

impl DeltaStream {
    pub fn new(body: ByteStream) -> Self {
        Self {
            body,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Build a stream over an in-memory SSE document (tests and mocks).
    pub fn from_sse_text(doc: &str) -> Self {
        let chunks = vec![Ok(doc.as_bytes().to_vec())];
        Self::new(Box::pin(futures_util::stream::iter(chunks)))
    }

    /// Next delta in arrival order, `None` once the sentinel or the end
    /// of the body is reached. A mid-stream transport error is yielded
    /// once, after everything already decoded, and ends the sequence.
    pub async fn next_delta(&mut self) -> Option<Result<String, LlmError>> {
        loop {
            if let Some(delta) = self.pending.pop_front() {
                return Some(Ok(delta));
            }
            if self.exhausted {
                return None;
            }
            match self.body.next().await {
                Some(Ok(bytes)) => {
                    for event in self.decoder.feed(&bytes) {
                        match event {
                            SseEvent::Delta(d) => self.pending.push_back(d),
                            SseEvent::Done     => self.exhausted = true,
                        }
                    }
                }
                Some(Err(e)) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
                None => self.exhausted = true,
            }
        }
    }

    /// Drain the remaining deltas into one string.
    pub async fn collect_text(&mut self) -> Result<String, LlmError> {
        let mut out = String::new();
        while let Some(delta) = self.next_delta().await {
            out.push_str(&delta?);
        }
        Ok(out)
    }
}

/// Render deltas as an SSE document (mock side of the wire format).
pub fn sse_document(deltas: &[&str]) -> String {
    let mut doc = String::new();
    for delta in deltas {
        let frame = serde_json::json!({"choices": [{"delta": {"content": delta}}]});
        doc.push_str(&format!("data: {}\n\n", frame));
    }
    doc.push_str("data: [DONE]\n\n");
    doc
}

//! Server-sent-event framing of the UI message stream.
//!
//! Every event is one `data: {json}\n\n` frame and the stream ends with a
//! `data: [DONE]\n\n` trailer. One frame is one replay-log entry, so stream
//! offsets count frames.

use crate::events::UIStreamEvent;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use thiserror::Error;

/// Payload of the trailer frame.
pub const DONE_MARKER: &str = "[DONE]";
/// Response header announcing the UI message stream protocol.
pub const UI_MESSAGE_STREAM_HEADER: &str = "x-vercel-ai-ui-message-stream";
pub const UI_MESSAGE_STREAM_VERSION: &str = "v1";
/// Response header naming the run a stream belongs to. Resume requests echo
/// it in the `run` query parameter.
pub const RUN_ID_HEADER: &str = "x-weft-run-id";

/// Encode one event as an SSE frame.
pub fn encode_frame(event: &UIStreamEvent) -> Result<Bytes, serde_json::Error> {
    let json = serde_json::to_string(event)?;
    Ok(Bytes::from(format!("data: {json}\n\n")))
}

/// The `[DONE]` trailer frame.
pub fn done_frame() -> Bytes {
    Bytes::from(format!("data: {DONE_MARKER}\n\n"))
}

/// Frame an event stream, appending the trailer after the last event.
pub fn encode_stream<S>(events: S) -> impl Stream<Item = Bytes> + Send
where
    S: Stream<Item = UIStreamEvent> + Send,
{
    events
        .filter_map(|event| async move {
            match encode_frame(&event) {
                Ok(frame) => Some(frame),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to encode ui stream event");
                    None
                }
            }
        })
        .chain(futures::stream::once(async { done_frame() }))
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum SseFrame {
    Event(UIStreamEvent),
    Done,
}

#[derive(Debug, Error)]
pub enum SseError {
    #[error("frame is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("invalid event payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Incremental SSE decoder.
///
/// Bytes may arrive split anywhere, including inside a UTF-8 sequence; a
/// frame is only decoded once its blank-line terminator has arrived.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<SseFrame, SseError>> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(pos) = find_frame_end(&self.buffer) {
            let raw: Vec<u8> = self.buffer.drain(..pos + 2).collect();
            if let Some(frame) = decode_frame(&raw[..pos]) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Bytes received but not yet part of a complete frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn find_frame_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

/// Decode one frame body (without its terminator). Comment-only and empty
/// frames yield `None`.
pub fn decode_frame(raw: &[u8]) -> Option<Result<SseFrame, SseError>> {
    let text = match std::str::from_utf8(raw) {
        Ok(text) => text,
        Err(e) => return Some(Err(e.into())),
    };
    let data: Vec<&str> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|payload| payload.strip_prefix(' ').unwrap_or(payload))
        .collect();
    if data.is_empty() {
        return None;
    }
    let payload = data.join("\n");
    if payload.trim() == DONE_MARKER {
        return Some(Ok(SseFrame::Done));
    }
    Some(
        serde_json::from_str(&payload)
            .map(SseFrame::Event)
            .map_err(SseError::from),
    )
}

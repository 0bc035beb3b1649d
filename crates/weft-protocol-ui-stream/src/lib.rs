//! UI message stream protocol.
//!
//! Converts agent events into the UI stream wire format, multiplexes several
//! producers into one ordered stream, frames it as SSE, and folds a received
//! stream back into a conversation message.
#![allow(missing_docs)]

mod encoder;
mod events;
mod reassembler;
pub mod sse;
mod writer;

pub use encoder::{UiStreamEncoder, INTERRUPTED_TOOL_ERROR};
pub use events::UIStreamEvent;
pub use reassembler::{reassemble, MessageReassembler, UNRESOLVED_TOOL_ERROR};
pub use sse::{
    done_frame, encode_frame, encode_stream, SseDecoder, SseError, SseFrame, DONE_MARKER,
    RUN_ID_HEADER, UI_MESSAGE_STREAM_HEADER, UI_MESSAGE_STREAM_VERSION,
};
pub use writer::{create_ui_message_stream, UiEventStream, UiStreamWriter, UNKNOWN_ERROR_MESSAGE};

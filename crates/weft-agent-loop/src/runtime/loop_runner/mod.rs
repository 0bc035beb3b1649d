//! The generation loop.
//!
//! One run drives the model and the tools it requests until a continuation
//! policy fires, the model answers without tool calls, the run is cancelled,
//! or an unrecoverable error occurs:
//!
//! ```text
//! GENERATING ─► tool calls? ─► TOOL_RUNNING ─► results appended ─► DECIDE_CONTINUE
//!     ▲                                                                  │
//!     └──────────────────────────── continue ◄───────────────────────────┘
//! ```
//!
//! Every path except the error path ends with exactly one `RunFinish`; the
//! error path ends with exactly one `Error`.

mod config;
mod outcome;
mod stream_runner;

#[cfg(test)]
mod tests;

use crate::contracts::{AgentEvent, AgentEventStream, Message, TerminationReason, ToolRegistry};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

pub use config::{AgentConfig, GenaiLlmExecutor, LlmEventStream, LlmExecutor};
pub use outcome::AgentLoopError;

/// Run the loop over `messages`, streaming agent events as they happen.
///
/// The returned stream drives the run: dropping it stops generation.
pub fn run_loop_stream(
    config: AgentConfig,
    registry: ToolRegistry,
    messages: Vec<Message>,
    cancellation_token: Option<CancellationToken>,
) -> AgentEventStream {
    stream_runner::run_stream(config, registry, messages, cancellation_token)
}

//! Protocol-agnostic events emitted by the agent loop.

use crate::tool::ToolResult;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;

/// Boxed stream of agent events.
pub type AgentEventStream = Pin<Box<dyn Stream<Item = AgentEvent> + Send>>;

/// Generic stopped payload emitted when a continuation policy ends the run.
///
/// `code` is a stable, machine-readable reason id.
/// `detail` is optional human-readable context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoppedReason {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl StoppedReason {
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            detail: None,
        }
    }

    #[must_use]
    pub fn with_detail(code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            detail: Some(detail.into()),
        }
    }
}

/// Why a run terminated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TerminationReason {
    /// LLM returned a response with no tool calls.
    NaturalEnd,
    /// A configured stop condition fired.
    Stopped(StoppedReason),
    /// External run cancellation signal was received.
    Cancelled,
    /// Run ended due to an error path.
    Error,
}

impl TerminationReason {
    #[must_use]
    pub fn stopped(code: impl Into<String>) -> Self {
        Self::Stopped(StoppedReason::new(code))
    }

    #[must_use]
    pub fn stopped_with_detail(code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Stopped(StoppedReason::with_detail(code, detail))
    }
}

/// Events emitted by one run of the agent loop, in emission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Run started. `message_id` names the assistant message the run produces.
    RunStart { run_id: String, message_id: String },
    /// Run finished. Emitted at most once and never after `Error`.
    RunFinish {
        run_id: String,
        result: Option<Value>,
        termination: TerminationReason,
    },

    /// Generation step started.
    StepStart { step: usize },
    /// Generation step completed (tools included).
    StepEnd,

    /// LLM text delta.
    TextDelta { delta: String },

    /// The model began a tool call.
    ToolCallStart { id: String, name: String },
    /// Tool call input is complete and execution begins.
    ToolCallReady {
        id: String,
        name: String,
        arguments: Value,
    },
    /// Partial `data-<kind>` payload emitted by a running tool.
    ToolCallData { id: String, kind: String, data: Value },
    /// Tool call completed, successfully or not.
    ToolCallDone { id: String, result: ToolResult },

    /// Unrecoverable run error. Terminal.
    Error { message: String },
}

impl AgentEvent {
    /// Whether no further events follow this one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::RunFinish { .. } | Self::Error { .. })
    }
}

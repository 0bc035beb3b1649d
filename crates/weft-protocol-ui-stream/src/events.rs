use serde::{Deserialize, Serialize};
use serde_json::Value;
use weft_contract::conversation::DATA_PART_PREFIX;
use weft_contract::ToolInvocationState;

/// Wire events of the UI message stream.
///
/// Each event is one SSE frame. Events that concern a tool call carry its
/// call id so consumers can merge repeated events into one evolving part.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UIStreamEvent {
    // ========================================================================
    // Message Lifecycle
    // ========================================================================
    /// Beginning of the assistant message: `{"type":"start","messageId":"..."}`.
    #[serde(rename = "start")]
    MessageStart {
        #[serde(rename = "messageId")]
        message_id: String,
    },

    /// Marks the beginning of a generation step.
    StartStep,

    /// Marks the completion of a generation step (tools included).
    FinishStep,

    // ========================================================================
    // Content
    // ========================================================================
    /// Incremental text; adjacent deltas concatenate.
    TextDelta { text: String },

    /// Current status of one tool call.
    ToolInvocation {
        #[serde(rename = "toolName")]
        tool_name: String,
        #[serde(rename = "callId")]
        call_id: String,
        status: ToolInvocationState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(rename = "errorText", default, skip_serializing_if = "Option::is_none")]
        error_text: Option<String>,
    },

    // ========================================================================
    // Stream Lifecycle
    // ========================================================================
    /// Normal completion.
    Finish {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// Unrecoverable failure; output streamed so far stays valid.
    Error { message: String },

    /// Run was cancelled.
    Abort {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    // ========================================================================
    // Tool Data (data-*)
    // ========================================================================
    /// Tool-declared payload. `type` is `data-<kind>`.
    #[serde(untagged)]
    Data {
        #[serde(rename = "type")]
        data_type: String,
        #[serde(rename = "callId", default, skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
        data: Value,
    },
}

impl UIStreamEvent {
    pub fn message_start(message_id: impl Into<String>) -> Self {
        Self::MessageStart {
            message_id: message_id.into(),
        }
    }

    pub fn start_step() -> Self {
        Self::StartStep
    }

    pub fn finish_step() -> Self {
        Self::FinishStep
    }

    pub fn text_delta(text: impl Into<String>) -> Self {
        Self::TextDelta { text: text.into() }
    }

    /// Create a tool-invocation event without input or result.
    pub fn tool_invocation(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        status: ToolInvocationState,
    ) -> Self {
        Self::ToolInvocation {
            tool_name: tool_name.into(),
            call_id: call_id.into(),
            status,
            input: None,
            result: None,
            error_text: None,
        }
    }

    pub fn tool_running(call_id: impl Into<String>, tool_name: impl Into<String>, input: Value) -> Self {
        Self::ToolInvocation {
            tool_name: tool_name.into(),
            call_id: call_id.into(),
            status: ToolInvocationState::Running,
            input: Some(input),
            result: None,
            error_text: None,
        }
    }

    pub fn tool_done(call_id: impl Into<String>, tool_name: impl Into<String>, result: Value) -> Self {
        Self::ToolInvocation {
            tool_name: tool_name.into(),
            call_id: call_id.into(),
            status: ToolInvocationState::Done,
            input: None,
            result: Some(result),
            error_text: None,
        }
    }

    pub fn tool_error(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        error_text: impl Into<String>,
    ) -> Self {
        Self::ToolInvocation {
            tool_name: tool_name.into(),
            call_id: call_id.into(),
            status: ToolInvocationState::Error,
            input: None,
            result: None,
            error_text: Some(error_text.into()),
        }
    }

    pub fn finish() -> Self {
        Self::Finish { reason: None }
    }

    pub fn finish_with_reason(reason: impl Into<String>) -> Self {
        Self::Finish {
            reason: Some(reason.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn abort(reason: impl Into<String>) -> Self {
        Self::Abort {
            reason: Some(reason.into()),
        }
    }

    /// Create a `data-<kind>` event tagged with a call id.
    pub fn data(kind: &str, call_id: impl Into<String>, data: Value) -> Self {
        Self::Data {
            data_type: format!("{DATA_PART_PREFIX}{kind}"),
            call_id: Some(call_id.into()),
            data,
        }
    }

    /// Whether this event closes the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Finish { .. } | Self::Error { .. } | Self::Abort { .. }
        )
    }

    /// Tool call id this event refers to, if any.
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            Self::ToolInvocation { call_id, .. } => Some(call_id),
            Self::Data { call_id, .. } => call_id.as_deref(),
            _ => None,
        }
    }

    /// Kind of a data event without the `data-` prefix.
    pub fn data_kind(&self) -> Option<&str> {
        match self {
            Self::Data { data_type, .. } => data_type.strip_prefix(DATA_PART_PREFIX),
            _ => None,
        }
    }
}

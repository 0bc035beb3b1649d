//! Execution context passed to tools.
//!
//! `ToolCallContext` carries the call's correlation id and an explicit sink
//! for partial `data-<kind>` payloads. Tools never write to a shared output
//! directly; the loop owns the receiving end and forwards emissions in order.

use crate::tool::contract::ToolError;
use crate::tool::data_kind::DataKind;
use futures::future::pending;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A partial payload emitted by a running tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolEmission {
    /// Correlation id (tool call id).
    pub call_id: String,
    /// Data kind without the `data-` prefix.
    pub kind: String,
    pub data: Value,
}

/// Sending half of the emission channel owned by the loop.
pub type EmissionSink = mpsc::UnboundedSender<ToolEmission>;

/// Execution context for one tool invocation.
#[derive(Clone)]
pub struct ToolCallContext {
    call_id: String,
    tool_name: String,
    data_kinds: Arc<[DataKind]>,
    sink: Option<EmissionSink>,
    cancellation_token: Option<CancellationToken>,
}

impl ToolCallContext {
    /// Create a context with no sink; emissions are validated and dropped.
    pub fn new(call_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            data_kinds: Arc::from(Vec::new()),
            sink: None,
            cancellation_token: None,
        }
    }

    #[must_use]
    pub fn with_data_kinds(mut self, kinds: Vec<DataKind>) -> Self {
        self.data_kinds = Arc::from(kinds);
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: EmissionSink) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Tool call id, used as the correlation id of every emission.
    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// Emit a `data-<kind>` payload for this call.
    ///
    /// Fails with [`ToolError::InvalidData`] when the tool did not declare
    /// `kind` or the payload does not match the declared schema.
    pub fn emit(&self, kind: &str, data: impl Serialize) -> Result<(), ToolError> {
        let declared = self
            .data_kinds
            .iter()
            .find(|k| k.name == kind)
            .ok_or_else(|| {
                ToolError::InvalidData(format!(
                    "tool '{}' did not declare data kind '{kind}'",
                    self.tool_name
                ))
            })?;
        let data = serde_json::to_value(data).map_err(|e| ToolError::InvalidData(e.to_string()))?;
        declared.validate(&data)?;

        let Some(sink) = &self.sink else {
            return Ok(());
        };
        let emission = ToolEmission {
            call_id: self.call_id.clone(),
            kind: kind.to_string(),
            data,
        };
        if sink.send(emission).is_err() {
            tracing::debug!(call_id = %self.call_id, kind, "emission dropped: run no longer listening");
        }
        Ok(())
    }

    /// Whether the run has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Resolves when the run is cancelled. Never resolves without a token.
    pub async fn cancelled(&self) {
        match &self.cancellation_token {
            Some(token) => token.cancelled().await,
            None => pending::<()>().await,
        }
    }
}

impl std::fmt::Debug for ToolCallContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCallContext")
            .field("call_id", &self.call_id)
            .field("tool_name", &self.tool_name)
            .field("data_kinds", &self.data_kinds.len())
            .field("sink", &self.sink.as_ref().map(|_| "<set>"))
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

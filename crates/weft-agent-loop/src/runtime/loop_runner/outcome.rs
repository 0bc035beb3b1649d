use super::*;
use crate::engine::tool_execution::ToolExecution;
use std::time::{Duration, Instant};

/// Error type for agent loop operations.
#[derive(Debug, thiserror::Error)]
pub enum AgentLoopError {
    /// The model backend failed to start or broke mid-stream.
    #[error("LLM error: {0}")]
    LlmError(String),
    /// A tool call failed while tool errors are configured as fatal.
    #[error("Tool '{tool}' failed ({call_id}): {message}")]
    ToolFailed {
        call_id: String,
        tool: String,
        message: String,
    },
    /// External cancellation signal requested run termination.
    #[error("Run cancelled")]
    Cancelled,
}

impl AgentLoopError {
    /// Normalize loop errors into lifecycle termination semantics.
    pub fn termination_reason(&self) -> TerminationReason {
        match self {
            Self::Cancelled => TerminationReason::Cancelled,
            Self::LlmError(_) | Self::ToolFailed { .. } => TerminationReason::Error,
        }
    }
}

/// Counters the continuation policies look at.
#[derive(Debug)]
pub(super) struct RunState {
    pub(super) completed_steps: usize,
    pub(super) consecutive_errors: usize,
    pub(super) tool_calls: usize,
    pub(super) tool_errors: usize,
    started: Instant,
}

impl RunState {
    pub(super) fn new() -> Self {
        Self {
            completed_steps: 0,
            consecutive_errors: 0,
            tool_calls: 0,
            tool_errors: 0,
            started: Instant::now(),
        }
    }

    pub(super) fn record_tool_step(&mut self, executions: &[ToolExecution]) {
        self.completed_steps += 1;
        let failed = executions.iter().filter(|e| e.result.is_error()).count();
        self.tool_calls += executions.len();
        self.tool_errors += failed;
        if !executions.is_empty() && failed == executions.len() {
            self.consecutive_errors += 1;
        } else {
            self.consecutive_errors = 0;
        }
    }

    pub(super) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// `RunFinish.result` payload for a run that ended on its own.
pub(super) fn run_finish_result(termination: &TerminationReason, text: &str) -> Option<Value> {
    if !matches!(termination, TerminationReason::NaturalEnd) || text.is_empty() {
        return None;
    }
    Some(serde_json::json!({ "response": text }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::tool::ToolResult;
    use crate::contracts::ToolCall;
    use serde_json::json;

    fn exec(ok: bool) -> ToolExecution {
        ToolExecution {
            call: ToolCall::new("c", "t", json!({})),
            result: if ok {
                ToolResult::success("t", json!(null))
            } else {
                ToolResult::error("t", "bad")
            },
        }
    }

    #[test]
    fn consecutive_errors_reset_on_partial_success() {
        let mut state = RunState::new();
        state.record_tool_step(&[exec(false), exec(false)]);
        state.record_tool_step(&[exec(false)]);
        assert_eq!(state.consecutive_errors, 2);
        state.record_tool_step(&[exec(false), exec(true)]);
        assert_eq!(state.consecutive_errors, 0);
        assert_eq!(state.completed_steps, 3);
        assert_eq!(state.tool_calls, 5);
        assert_eq!(state.tool_errors, 4);
    }

    #[test]
    fn result_only_for_natural_end_with_text() {
        assert_eq!(
            run_finish_result(&TerminationReason::NaturalEnd, "hi"),
            Some(json!({"response": "hi"}))
        );
        assert_eq!(run_finish_result(&TerminationReason::NaturalEnd, ""), None);
        assert_eq!(run_finish_result(&TerminationReason::Cancelled, "hi"), None);
    }

    #[test]
    fn loop_error_termination_mapping() {
        assert_eq!(
            AgentLoopError::Cancelled.termination_reason(),
            TerminationReason::Cancelled
        );
        assert_eq!(
            AgentLoopError::LlmError("x".into()).termination_reason(),
            TerminationReason::Error
        );
    }
}

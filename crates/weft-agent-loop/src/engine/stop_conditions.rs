//! Continuation policies for the generation loop.
//!
//! After every step that ran tools, the loop evaluates the configured
//! policies in declaration order. The first policy that returns a
//! [`StopReason`] ends the run, so a list of policies reads as a disjunction:
//! `stop_on_tool("getWeather") || max_rounds(3)`.
//!
//! An empty list means "always continue" while the model keeps requesting
//! tools; [`SingleStep`] means "never continue".
//!
//! # Built-in Conditions
//!
//! - [`MaxRounds`]: Stop after N steps
//! - [`StopOnTool`]: Stop when a specific tool was called in the last step
//! - [`SingleStep`]: Stop after the first step
//! - [`Timeout`]: Stop after a duration elapses
//! - [`ConsecutiveErrors`]: Stop after N consecutive steps where every tool failed
//! - [`ContentMatch`]: Stop when step text contains a pattern

use crate::contracts::{StoppedReason, ToolCall};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Why a continuation policy ended the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    MaxRoundsReached,
    ToolCalled(String),
    SingleStep,
    TimeoutReached,
    ConsecutiveErrorsExceeded,
    ContentMatched(String),
}

impl StopReason {
    /// Stable code carried by the run's termination reason.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MaxRoundsReached => "max_rounds_reached",
            Self::ToolCalled(_) => "tool_called",
            Self::SingleStep => "single_step",
            Self::TimeoutReached => "timeout_reached",
            Self::ConsecutiveErrorsExceeded => "consecutive_errors_exceeded",
            Self::ContentMatched(_) => "content_matched",
        }
    }

    pub fn into_stopped(self) -> StoppedReason {
        let code = self.code();
        match self {
            Self::ToolCalled(detail) | Self::ContentMatched(detail) => {
                StoppedReason::with_detail(code, detail)
            }
            _ => StoppedReason::new(code),
        }
    }
}

/// Snapshot of loop state provided to continuation checks.
pub struct StopCheckContext<'a> {
    /// Number of completed generation steps.
    pub rounds: usize,
    /// Number of consecutive steps where all tools failed.
    pub consecutive_errors: usize,
    /// Time elapsed since the loop started.
    pub elapsed: Duration,
    /// Tool calls from the most recent step.
    pub last_tool_calls: &'a [ToolCall],
    /// Text from the most recent step.
    pub last_text: &'a str,
}

/// A composable continuation policy.
pub trait StopPolicy: Send + Sync {
    /// Identifier used in logging.
    fn id(&self) -> &str;

    /// Return `Some` to stop the loop, `None` to continue.
    fn evaluate(&self, ctx: &StopCheckContext<'_>) -> Option<StopReason>;
}

/// Evaluate policies in declaration order and return the first match.
pub fn check_stop_policies(
    policies: &[Arc<dyn StopPolicy>],
    ctx: &StopCheckContext<'_>,
) -> Option<StopReason> {
    for policy in policies {
        if let Some(reason) = policy.evaluate(ctx) {
            tracing::debug!(policy = policy.id(), reason = reason.code(), "stop policy fired");
            return Some(reason);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Built-in conditions
// ---------------------------------------------------------------------------

/// Stop after a fixed number of steps.
pub struct MaxRounds(pub usize);

impl StopPolicy for MaxRounds {
    fn id(&self) -> &str {
        "max_rounds"
    }

    fn evaluate(&self, ctx: &StopCheckContext<'_>) -> Option<StopReason> {
        (ctx.rounds >= self.0).then_some(StopReason::MaxRoundsReached)
    }
}

/// Stop when a specific tool was called in the last step.
pub struct StopOnTool(pub String);

impl StopPolicy for StopOnTool {
    fn id(&self) -> &str {
        "stop_on_tool"
    }

    fn evaluate(&self, ctx: &StopCheckContext<'_>) -> Option<StopReason> {
        ctx.last_tool_calls
            .iter()
            .any(|call| call.name == self.0)
            .then(|| StopReason::ToolCalled(self.0.clone()))
    }
}

/// Never continue past the first step.
pub struct SingleStep;

impl StopPolicy for SingleStep {
    fn id(&self) -> &str {
        "single_step"
    }

    fn evaluate(&self, ctx: &StopCheckContext<'_>) -> Option<StopReason> {
        (ctx.rounds >= 1).then_some(StopReason::SingleStep)
    }
}

/// Stop after a wall-clock duration elapses.
pub struct Timeout(pub Duration);

impl StopPolicy for Timeout {
    fn id(&self) -> &str {
        "timeout"
    }

    fn evaluate(&self, ctx: &StopCheckContext<'_>) -> Option<StopReason> {
        (ctx.elapsed >= self.0).then_some(StopReason::TimeoutReached)
    }
}

/// Stop after N consecutive steps where every tool execution failed.
pub struct ConsecutiveErrors(pub usize);

impl StopPolicy for ConsecutiveErrors {
    fn id(&self) -> &str {
        "consecutive_errors"
    }

    fn evaluate(&self, ctx: &StopCheckContext<'_>) -> Option<StopReason> {
        (self.0 > 0 && ctx.consecutive_errors >= self.0)
            .then_some(StopReason::ConsecutiveErrorsExceeded)
    }
}

/// Stop when step text contains a literal pattern.
pub struct ContentMatch(pub String);

impl StopPolicy for ContentMatch {
    fn id(&self) -> &str {
        "content_match"
    }

    fn evaluate(&self, ctx: &StopCheckContext<'_>) -> Option<StopReason> {
        (!self.0.is_empty() && ctx.last_text.contains(&self.0))
            .then(|| StopReason::ContentMatched(self.0.clone()))
    }
}

// ---------------------------------------------------------------------------
// StopConditionSpec resolution
// ---------------------------------------------------------------------------

/// Declarative continuation policy, as found in configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StopConditionSpec {
    /// Stop after a fixed number of steps.
    MaxRounds { rounds: usize },
    /// Stop when a specific tool is called by the LLM.
    StopOnTool { tool_name: String },
    /// Never continue past the first step.
    SingleStep,
    /// Stop after a wall-clock duration (in seconds) elapses.
    Timeout { seconds: u64 },
    /// Stop after N consecutive steps where all tools failed. 0 = disabled.
    ConsecutiveErrors { max: usize },
    /// Stop when LLM output text contains a literal pattern.
    ContentMatch { pattern: String },
}

impl StopConditionSpec {
    /// Resolve to a runtime policy.
    pub fn into_policy(self) -> Arc<dyn StopPolicy> {
        match self {
            Self::MaxRounds { rounds } => Arc::new(MaxRounds(rounds)),
            Self::StopOnTool { tool_name } => Arc::new(StopOnTool(tool_name)),
            Self::SingleStep => Arc::new(SingleStep),
            Self::Timeout { seconds } => Arc::new(Timeout(Duration::from_secs(seconds))),
            Self::ConsecutiveErrors { max } => Arc::new(ConsecutiveErrors(max)),
            Self::ContentMatch { pattern } => Arc::new(ContentMatch(pattern)),
        }
    }
}

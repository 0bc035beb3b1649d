//! Tool execution utilities.

use crate::contracts::tool::{EmissionSink, Tool, ToolCallContext, ToolRegistry, ToolResult};
use crate::contracts::ToolCall;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// How tool calls requested in the same step are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolExecutionMode {
    /// One call at a time, in request order.
    #[default]
    Sequential,
    /// All calls polled concurrently; results still reported in request order.
    Parallel,
}

/// Outcome of one tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolExecution {
    pub call: ToolCall,
    pub result: ToolResult,
}

/// Wiring shared by every tool context of a step.
#[derive(Debug, Clone, Default)]
pub struct ToolExecutionEnv {
    /// Receives `data-<kind>` emissions of running tools.
    pub sink: Option<EmissionSink>,
    /// Run cancellation token observed by tools.
    pub cancellation_token: Option<CancellationToken>,
}

impl ToolExecutionEnv {
    fn context_for(&self, call: &ToolCall, tool: &dyn Tool) -> ToolCallContext {
        let mut ctx = ToolCallContext::new(&call.id, &call.name)
            .with_data_kinds(tool.descriptor().data_kinds);
        if let Some(sink) = &self.sink {
            ctx = ctx.with_sink(sink.clone());
        }
        if let Some(token) = &self.cancellation_token {
            ctx = ctx.with_cancellation_token(token.clone());
        }
        ctx
    }
}

/// Execute a single tool call.
///
/// Never fails: a missing tool, rejected arguments, or an execution error all
/// become an error [`ToolResult`] with a stable code.
pub async fn execute_single_tool(
    tool: Option<&dyn Tool>,
    call: &ToolCall,
    env: &ToolExecutionEnv,
) -> ToolExecution {
    let Some(tool) = tool else {
        return ToolExecution {
            call: call.clone(),
            result: ToolResult::error_with_code(
                &call.name,
                "not_found",
                format!("Tool '{}' not found", call.name),
            ),
        };
    };

    if let Err(e) = tool.validate_args(&call.arguments) {
        tracing::debug!(call_id = %call.id, tool = %call.name, error = %e, "tool arguments rejected");
        return ToolExecution {
            call: call.clone(),
            result: ToolResult::error_with_code(&call.name, e.code(), e.to_string()),
        };
    }

    let ctx = env.context_for(call, tool);
    let result = match tool.execute(call.arguments.clone(), &ctx).await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(call_id = %call.id, tool = %call.name, error = %e, "tool execution failed");
            ToolResult::error_with_code(&call.name, e.code(), e.to_string())
        }
    };

    ToolExecution {
        call: call.clone(),
        result,
    }
}

/// Execute tool calls concurrently. Results are returned in request order.
pub async fn execute_tools_parallel(
    registry: &ToolRegistry,
    calls: &[ToolCall],
    env: &ToolExecutionEnv,
) -> Vec<ToolExecution> {
    let tasks = calls.iter().map(|call| {
        let tool = registry.get(&call.name);
        async move { execute_single_tool(tool.as_deref(), call, env).await }
    });
    join_all(tasks).await
}

/// Execute tool calls one after another in request order.
pub async fn execute_tools_sequential(
    registry: &ToolRegistry,
    calls: &[ToolCall],
    env: &ToolExecutionEnv,
) -> Vec<ToolExecution> {
    let mut executions = Vec::with_capacity(calls.len());
    for call in calls {
        let tool = registry.get(&call.name);
        executions.push(execute_single_tool(tool.as_deref(), call, env).await);
    }
    executions
}

/// Execute tool calls with the given scheduling mode.
pub async fn execute_tools(
    mode: ToolExecutionMode,
    registry: &ToolRegistry,
    calls: &[ToolCall],
    env: &ToolExecutionEnv,
) -> Vec<ToolExecution> {
    match mode {
        ToolExecutionMode::Sequential => execute_tools_sequential(registry, calls, env).await,
        ToolExecutionMode::Parallel => execute_tools_parallel(registry, calls, env).await,
    }
}

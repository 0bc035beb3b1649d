use super::cancellable_delay;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use std::time::Duration;
use weft_contract::{ToolCallContext, ToolError, ToolResult, TypedTool};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GenerateCodeArgs {
    /// Repository to generate code for.
    pub repo: String,
}

/// Simulated code generation.
#[derive(Debug, Clone)]
pub struct GenerateCodeTool {
    delay: Duration,
}

impl GenerateCodeTool {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl TypedTool for GenerateCodeTool {
    type Args = GenerateCodeArgs;

    fn tool_id(&self) -> &str {
        "generateCode"
    }

    fn name(&self) -> &str {
        "Generate Code"
    }

    fn description(&self) -> &str {
        "Generate code based on requirements"
    }

    async fn execute(
        &self,
        args: GenerateCodeArgs,
        ctx: &ToolCallContext,
    ) -> Result<ToolResult, ToolError> {
        cancellable_delay(self.delay, ctx).await?;
        Ok(ToolResult::success(
            "generateCode",
            format!("Generated 3 files for {}", args.repo),
        ))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreatePrArgs {
    /// Branch the pull request is opened from.
    pub branch: String,
}

/// Simulated pull request creation.
#[derive(Debug, Clone)]
pub struct CreatePrTool {
    delay: Duration,
}

impl CreatePrTool {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl TypedTool for CreatePrTool {
    type Args = CreatePrArgs;

    fn tool_id(&self) -> &str {
        "createPR"
    }

    fn name(&self) -> &str {
        "Create PR"
    }

    fn description(&self) -> &str {
        "Create a pull request with generated code"
    }

    fn validate(&self, args: &CreatePrArgs) -> Result<(), String> {
        if args.branch.trim().is_empty() {
            return Err("branch cannot be empty".to_string());
        }
        Ok(())
    }

    async fn execute(
        &self,
        args: CreatePrArgs,
        ctx: &ToolCallContext,
    ) -> Result<ToolResult, ToolError> {
        cancellable_delay(self.delay, ctx).await?;
        Ok(ToolResult::success(
            "createPR",
            format!("Created a PR for {}", args.branch),
        ))
    }
}

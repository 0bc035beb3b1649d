//! Tool trait for model-callable actions.
//!
//! Tools receive validated JSON arguments and a [`ToolCallContext`] through
//! which they stream partial `data-<kind>` payloads before returning.

use crate::tool::context::ToolCallContext;
use crate::tool::data_kind::DataKind;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Tool execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    /// Execution succeeded.
    Success,
    /// Execution failed.
    Error,
}

/// Result of tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool name.
    pub tool_name: String,
    /// Execution status.
    pub status: ToolStatus,
    /// Result data.
    pub data: Value,
    /// Optional message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ToolResult {
    /// Create a success result.
    pub fn success(tool_name: impl Into<String>, data: impl Into<Value>) -> Self {
        Self {
            tool_name: tool_name.into(),
            status: ToolStatus::Success,
            data: data.into(),
            message: None,
        }
    }

    /// Create an error result.
    pub fn error(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            status: ToolStatus::Error,
            data: Value::Null,
            message: Some(message.into()),
        }
    }

    /// Create a structured error result with stable error code payload.
    pub fn error_with_code(
        tool_name: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let code = code.into();
        let message = message.into();
        Self {
            tool_name: tool_name.into(),
            status: ToolStatus::Error,
            data: serde_json::json!({
                "error": {
                    "code": code,
                    "message": message,
                }
            }),
            message: Some(format!("[{code}] {message}")),
        }
    }

    /// Check if execution succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self.status, ToolStatus::Success)
    }

    /// Check if execution failed.
    pub fn is_error(&self) -> bool {
        matches!(self.status, ToolStatus::Error)
    }

    /// Error text shown to consumers for failed calls.
    pub fn error_text(&self) -> Option<&str> {
        if self.is_error() {
            Some(self.message.as_deref().unwrap_or("tool failed"))
        } else {
            None
        }
    }

    /// Convert to JSON value for serialization.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Tool execution errors.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ToolError {
    /// Stable error code used in structured error results.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArguments(_) => "invalid_arguments",
            Self::ExecutionFailed(_) => "execution_failed",
            Self::InvalidData(_) => "invalid_data",
            Self::NotFound(_) => "not_found",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal",
        }
    }
}

/// Tool descriptor containing metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool ID, as seen by the model.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Tool description.
    pub description: String,
    /// JSON schema for parameters.
    pub parameters: Value,
    /// `data-<kind>` payloads this tool may emit while running.
    #[serde(default)]
    pub data_kinds: Vec<DataKind>,
}

impl ToolDescriptor {
    /// Create a new tool descriptor.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
            data_kinds: Vec::new(),
        }
    }

    /// Set parameters schema.
    pub fn with_parameters(mut self, schema: Value) -> Self {
        self.parameters = schema;
        self
    }

    /// Declare a data kind emitted by this tool.
    pub fn with_data_kind(mut self, kind: DataKind) -> Self {
        self.data_kinds.push(kind);
        self
    }
}

/// Tool trait for implementing model-callable tools.
///
/// # Example
///
/// ```ignore
/// struct Progress;
///
/// #[async_trait]
/// impl Tool for Progress {
///     fn descriptor(&self) -> ToolDescriptor {
///         ToolDescriptor::new("progress", "Progress", "Report progress")
///             .with_data_kind(DataKind::new("progress", json!({"type": "object"})))
///     }
///
///     async fn execute(&self, _args: Value, ctx: &ToolCallContext) -> Result<ToolResult, ToolError> {
///         ctx.emit("progress", json!({"pct": 50}))?;
///         Ok(ToolResult::success("progress", json!({"pct": 100})))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool descriptor.
    fn descriptor(&self) -> ToolDescriptor;

    /// Validate tool arguments against the descriptor's JSON Schema before execution.
    ///
    /// The default implementation uses [`validate_against_schema`] with
    /// `descriptor().parameters`. Override to customise or skip validation.
    fn validate_args(&self, args: &Value) -> Result<(), ToolError> {
        validate_against_schema(&self.descriptor().parameters, args)
    }

    /// Execute the tool.
    ///
    /// `ctx.call_id()` is the correlation id every emission is tagged with.
    async fn execute(&self, args: Value, ctx: &ToolCallContext) -> Result<ToolResult, ToolError>;
}

/// Validate a JSON value against a JSON Schema.
///
/// Returns `Ok(())` if the value conforms to the schema, or
/// `Err(ToolError::InvalidArguments)` with a description of all violations.
pub fn validate_against_schema(schema: &Value, args: &Value) -> Result<(), ToolError> {
    match schema_violations(schema, args)? {
        None => Ok(()),
        Some(violations) => Err(ToolError::InvalidArguments(violations)),
    }
}

/// Joined violation messages, or `None` when the value conforms.
pub(crate) fn schema_violations(schema: &Value, value: &Value) -> Result<Option<String>, ToolError> {
    let validator = jsonschema::Validator::new(schema)
        .map_err(|e| ToolError::Internal(format!("invalid schema: {e}")))?;
    if validator.is_valid(value) {
        return Ok(None);
    }
    let errors: Vec<String> = validator.iter_errors(value).map(|e| e.to_string()).collect();
    Ok(Some(errors.join("; ")))
}

// ---------------------------------------------------------------------------
// TypedTool – strongly-typed tool with automatic schema generation
// ---------------------------------------------------------------------------

/// Strongly-typed variant of [`Tool`] with automatic JSON Schema generation.
///
/// Implement this trait instead of [`Tool`] when your tool has a fixed
/// parameter shape. A blanket impl provides [`Tool`] automatically.
#[async_trait]
pub trait TypedTool: Send + Sync {
    /// Argument type, must derive `Deserialize` and `JsonSchema`.
    type Args: for<'de> Deserialize<'de> + JsonSchema + Send;

    /// Unique tool id, as seen by the model.
    fn tool_id(&self) -> &str;

    /// Human-readable tool name.
    fn name(&self) -> &str;

    /// Tool description shown to the LLM.
    fn description(&self) -> &str;

    /// Data kinds this tool emits.
    fn data_kinds(&self) -> Vec<DataKind> {
        Vec::new()
    }

    /// Optional business-logic validation after deserialization.
    ///
    /// Return `Err(message)` to reject with [`ToolError::InvalidArguments`].
    fn validate(&self, _args: &Self::Args) -> Result<(), String> {
        Ok(())
    }

    /// Execute with typed arguments.
    async fn execute(
        &self,
        args: Self::Args,
        ctx: &ToolCallContext,
    ) -> Result<ToolResult, ToolError>;
}

#[async_trait]
impl<T: TypedTool> Tool for T {
    fn descriptor(&self) -> ToolDescriptor {
        let schema = schema_for_type::<T::Args>();
        let mut descriptor = ToolDescriptor::new(self.tool_id(), self.name(), self.description())
            .with_parameters(schema);
        descriptor.data_kinds = self.data_kinds();
        descriptor
    }

    /// Deserializes and runs [`TypedTool::validate`] so invalid input is
    /// rejected before execution starts.
    fn validate_args(&self, args: &Value) -> Result<(), ToolError> {
        let typed: T::Args = serde_json::from_value(args.clone())
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        self.validate(&typed).map_err(ToolError::InvalidArguments)
    }

    async fn execute(&self, args: Value, ctx: &ToolCallContext) -> Result<ToolResult, ToolError> {
        let typed: T::Args =
            serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        self.validate(&typed).map_err(ToolError::InvalidArguments)?;
        TypedTool::execute(self, typed, ctx).await
    }
}

/// Generate a JSON Schema `Value` from a type implementing `JsonSchema`.
pub fn schema_for_type<T: JsonSchema>() -> Value {
    let mut v = serde_json::to_value(schemars::schema_for!(T))
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}));
    // Providers reject the $schema key.
    if let Some(obj) = v.as_object_mut() {
        obj.remove("$schema");
    }
    v
}

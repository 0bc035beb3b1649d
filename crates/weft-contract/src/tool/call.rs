//! Tool call requested by the model.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool call collected from one generation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call id assigned by the model backend; the correlation id of every part
    /// this call produces.
    pub id: String,
    /// Tool id.
    pub name: String,
    /// Parsed JSON arguments.
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

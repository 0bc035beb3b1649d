//! Tool contract, execution context, and registries.

pub mod call;
pub mod context;
pub mod contract;
pub mod data_kind;
pub mod registry;

pub use call::ToolCall;
pub use context::{EmissionSink, ToolCallContext, ToolEmission};
pub use contract::{
    validate_against_schema, Tool, ToolDescriptor, ToolError, ToolResult, ToolStatus, TypedTool,
};
pub use data_kind::{DataKind, DataKindRegistry};
pub use registry::{ToolRegistry, ToolRegistryError};

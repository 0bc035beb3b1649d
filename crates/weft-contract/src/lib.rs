//! Shared contracts for conversations, agent events, tools, and storage.
#![allow(missing_docs)]

pub mod conversation;
pub mod event;
pub mod storage;
pub mod tool;

pub use conversation::{Conversation, Message, Part, Role, ToolInvocationState};
pub use event::{AgentEvent, AgentEventStream, StoppedReason, TerminationReason};
pub use storage::{ConversationStore, StoreError};
pub use tool::{
    DataKind, DataKindRegistry, Tool, ToolCall, ToolCallContext, ToolDescriptor, ToolEmission,
    ToolError, ToolRegistry, ToolRegistryError, ToolResult, ToolStatus, TypedTool,
};

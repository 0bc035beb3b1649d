//! Streaming generation loop for weft.
//!
//! [`runtime::loop_runner::run_loop_stream`] drives a model backend and the
//! tools it requests, emitting [`contracts::AgentEvent`]s as they happen.
#![allow(missing_docs)]

pub use weft_contract as contracts;

pub mod engine;
pub mod runtime;

pub use engine::stop_conditions::{StopConditionSpec, StopPolicy, StopReason};
pub use engine::tool_execution::ToolExecutionMode;
pub use runtime::loop_runner::{
    run_loop_stream, AgentConfig, AgentLoopError, GenaiLlmExecutor, LlmEventStream, LlmExecutor,
};

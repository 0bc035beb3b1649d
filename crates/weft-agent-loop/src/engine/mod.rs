pub mod convert;
pub mod stop_conditions;
pub mod tool_execution;

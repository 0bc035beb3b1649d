//! Runtime: the loop runner and stream collection.

pub mod loop_runner;
pub mod streaming;

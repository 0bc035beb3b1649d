//! HTTP service for resumable chat streams.
//!
//! Each chat run is recorded into a [`session::StreamSession`]; clients read
//! it live, re-attach at a frame offset after a disconnect, query its status,
//! or cancel it. Finished runs are folded into the conversation store.

pub mod config;
pub mod fanout;
pub mod http;
pub mod persist;
pub mod service;
pub mod session;
pub mod tools;

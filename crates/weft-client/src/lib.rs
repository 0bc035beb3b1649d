//! Resumable transport client for weft chat streams.
//!
//! [`ResumableClient`] talks to the chat endpoints of `weft-server`: it starts
//! runs, reports their status, re-attaches to a run's remaining output after a
//! disconnect and cancels runs. Concurrent starts for one chat share a single
//! physical request through the [`InflightRegistry`].

mod client;
mod error;
mod fingerprint;
mod registry;

pub use client::{ResumableClient, ResumableStream, StreamStatus};
pub use error::TransportError;
pub use fingerprint::Fingerprint;
pub use registry::{Claim, InflightEntry, InflightRegistry};

//! Part multiplexer.
//!
//! [`create_ui_message_stream`] hands a cloneable [`UiStreamWriter`] to an
//! async task and returns the single ordered output of everything written
//! through any clone of it. Commands are applied in the order they were
//! issued: a `write` appends one event, a `merge` drains another event stream
//! to completion before the next command is looked at.
//!
//! The output carries exactly one terminal event. If the task returns without
//! writing one, the multiplexer appends `finish` (task succeeded) or `error`
//! (task failed or panicked). Anything written after the terminal event is
//! dropped.

use crate::events::UIStreamEvent;
use async_stream::stream;
use futures::{Stream, StreamExt};
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;

/// Boxed stream of UI events.
pub type UiEventStream = Pin<Box<dyn Stream<Item = UIStreamEvent> + Send>>;

/// Message reported when the producing task panics.
pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred.";

enum WriterCommand {
    Part(UIStreamEvent),
    Merge(UiEventStream),
    /// The producing task ended; `Some` carries its error message.
    Close(Option<String>),
}

/// Handle for appending to a multiplexed UI stream.
#[derive(Clone)]
pub struct UiStreamWriter {
    tx: mpsc::UnboundedSender<WriterCommand>,
}

impl std::fmt::Debug for UiStreamWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiStreamWriter")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl UiStreamWriter {
    /// Append one event.
    pub fn write(&self, event: UIStreamEvent) {
        if self.tx.send(WriterCommand::Part(event)).is_err() {
            tracing::debug!("ui stream closed; dropping part");
        }
    }

    /// Splice `stream` into the output at this point.
    ///
    /// Returns immediately; the multiplexer drains `stream` before applying
    /// any command issued after this one.
    pub fn merge<S>(&self, stream: S)
    where
        S: Stream<Item = UIStreamEvent> + Send + 'static,
    {
        if self
            .tx
            .send(WriterCommand::Merge(Box::pin(stream)))
            .is_err()
        {
            tracing::debug!("ui stream closed; dropping merged stream");
        }
    }

    /// Whether the output side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Run `execute` with a fresh writer and return the multiplexed output.
///
/// `execute` runs on its own task, so it keeps going if the returned stream
/// is dropped. Must be called within a Tokio runtime.
pub fn create_ui_message_stream<F, Fut, E>(execute: F) -> UiEventStream
where
    F: FnOnce(UiStreamWriter) -> Fut,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(execute(UiStreamWriter { tx: tx.clone() }));

    tokio::spawn(async move {
        let outcome = match task.await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(join_error) => {
                tracing::error!(error = %join_error, "ui stream producer panicked");
                Some(UNKNOWN_ERROR_MESSAGE.to_string())
            }
        };
        let _ = tx.send(WriterCommand::Close(outcome));
    });

    Box::pin(stream! {
        let mut terminated = false;

        macro_rules! emit {
            ($event:expr) => {{
                let event: UIStreamEvent = $event;
                if terminated {
                    tracing::warn!(?event, "part written after terminal event; dropped");
                } else {
                    terminated = event.is_terminal();
                    yield event;
                }
            }};
        }

        while let Some(command) = rx.recv().await {
            match command {
                WriterCommand::Part(event) => {
                    emit!(event);
                }
                WriterCommand::Merge(mut merged) => {
                    while let Some(event) = merged.next().await {
                        emit!(event);
                    }
                }
                WriterCommand::Close(outcome) => {
                    if !terminated {
                        let closing = match outcome {
                            None => UIStreamEvent::finish(),
                            Some(message) => UIStreamEvent::error(message),
                        };
                        yield closing;
                    }
                    break;
                }
            }
        }
    })
}

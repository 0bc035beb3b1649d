use thiserror::Error;
use weft_protocol_ui_stream::SseError;

/// Errors of the resumable transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No stream is known for the fingerprint; callers should fall back to `start`.
    #[error("no stream found for {0}")]
    NotFound(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid stream frame: {0}")]
    Decode(#[from] SseError),

    /// The connection ended before the `[DONE]` trailer.
    #[error("stream closed before completion")]
    Closed,

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl TransportError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

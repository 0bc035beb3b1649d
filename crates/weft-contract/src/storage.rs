//! Conversation storage contract.

use crate::conversation::Conversation;
use async_trait::async_trait;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Conversation not found.
    #[error("Conversation not found: {0}")]
    NotFound(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid conversation id (path traversal, control chars, etc.).
    #[error("Invalid conversation id: {0}")]
    InvalidId(String),
}

/// Durable store for finalized conversations, keyed by conversation id.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Load a conversation, `None` when it was never saved.
    async fn load(&self, id: &str) -> Result<Option<Conversation>, StoreError>;

    /// Create or overwrite the record for `conversation.id`.
    async fn save(&self, conversation: &Conversation) -> Result<(), StoreError>;

    /// Delete a conversation. Deleting a missing id is not an error.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Load a conversation or fail with [`StoreError::NotFound`].
    async fn require(&self, id: &str) -> Result<Conversation, StoreError> {
        self.load(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

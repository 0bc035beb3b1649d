use async_trait::async_trait;
use std::collections::HashMap;
use weft_contract::{Conversation, ConversationStore, StoreError};

/// In-memory storage for testing and local development.
#[derive(Default)]
pub struct MemoryStore {
    entries: tokio::sync::RwLock<HashMap<String, Conversation>>,
}

impl MemoryStore {
    /// Create a new in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of every stored conversation, sorted.
    pub async fn ids(&self) -> Vec<String> {
        let entries = self.entries.read().await;
        let mut ids: Vec<String> = entries.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn load(&self, id: &str) -> Result<Option<Conversation>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.get(id).cloned())
    }

    async fn save(&self, conversation: &Conversation) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.insert(conversation.id.clone(), conversation.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.remove(id);
        Ok(())
    }
}

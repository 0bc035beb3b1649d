use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use weft_contract::{Conversation, ConversationStore, StoreError};

/// One pretty-printed JSON file per conversation under a base directory.
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    /// Create a new file storage with the given base path.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub(crate) fn conversation_path(&self, id: &str) -> Result<PathBuf, StoreError> {
        Self::validate_id(id)?;
        Ok(self.base_path.join(format!("{id}.json")))
    }

    /// Validate that a conversation id is safe for use as a filename.
    /// Rejects path separators, `..`, and control characters.
    fn validate_id(id: &str) -> Result<(), StoreError> {
        if id.is_empty() {
            return Err(StoreError::InvalidId(
                "conversation id cannot be empty".to_string(),
            ));
        }
        if id.contains('/') || id.contains('\\') || id.contains("..") || id.contains('\0') {
            return Err(StoreError::InvalidId(format!(
                "conversation id contains invalid characters: {id:?}"
            )));
        }
        if id.chars().any(|c| c.is_control()) {
            return Err(StoreError::InvalidId(format!(
                "conversation id contains control characters: {id:?}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for FileStore {
    async fn load(&self, id: &str) -> Result<Option<Conversation>, StoreError> {
        let path = self.conversation_path(id)?;
        if !path.exists() {
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(&path).await?;
        let conversation = serde_json::from_str(&content)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(Some(conversation))
    }

    async fn save(&self, conversation: &Conversation) -> Result<(), StoreError> {
        let path = self.conversation_path(&conversation.id)?;
        if !self.base_path.exists() {
            tokio::fs::create_dir_all(&self.base_path).await?;
        }
        let content = serde_json::to_string_pretty(conversation)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        // Write to a sibling temp file and rename so readers never see a torn file.
        let tmp_path = self.base_path.join(format!(
            ".{}.{}.tmp",
            conversation.id,
            uuid::Uuid::new_v4().simple()
        ));

        let write_result = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(content.as_bytes()).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            match tokio::fs::rename(&tmp_path, &path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    tokio::fs::remove_file(&path).await?;
                    tokio::fs::rename(&tmp_path, &path).await?;
                }
                Err(e) => return Err(e),
            }
            Ok::<(), std::io::Error>(())
        }
        .await;

        if let Err(e) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(e));
        }
        tracing::debug!(conversation_id = %conversation.id, path = %path.display(), "conversation saved");
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let path = self.conversation_path(id)?;
        if path.exists() {
            tokio::fs::remove_file(&path).await?;
        }
        Ok(())
    }
}

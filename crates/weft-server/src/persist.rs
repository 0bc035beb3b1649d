//! Persistence branch: fold a run's SSE frames into the stored conversation.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use weft_contract::{Conversation, ConversationStore, Message, StoreError};
use weft_protocol_ui_stream::{MessageReassembler, SseDecoder, SseFrame};

/// Drain `frames`, reassemble the assistant message and save the conversation
/// (`history` followed by that message) under `chat_id`.
///
/// Malformed frames are skipped. The conversation is saved even when the
/// stream ends without its trailer.
pub async fn persist_frames<S>(
    frames: S,
    store: Arc<dyn ConversationStore>,
    chat_id: String,
    history: Vec<Message>,
) -> Result<Message, StoreError>
where
    S: Stream<Item = Bytes> + Send,
{
    let mut frames = std::pin::pin!(frames);
    let mut decoder = SseDecoder::new();
    let mut reassembler = MessageReassembler::new();

    'frames: while let Some(chunk) = frames.next().await {
        for decoded in decoder.push(&chunk) {
            match decoded {
                Ok(SseFrame::Event(event)) => reassembler.apply(&event),
                Ok(SseFrame::Done) => break 'frames,
                Err(e) => {
                    tracing::warn!(chat_id = %chat_id, error = %e, "skipping undecodable frame");
                }
            }
        }
    }

    let message = reassembler.finish();
    let conversation = Conversation::new(chat_id.as_str())
        .with_messages(history)
        .with_message(message.clone());
    store.save(&conversation).await?;
    tracing::debug!(chat_id = %chat_id, parts = message.parts.len(), "conversation persisted");
    Ok(message)
}

/// Run [`persist_frames`] on its own task. Failures are logged only.
pub fn spawn_persist<S>(
    frames: S,
    store: Arc<dyn ConversationStore>,
    chat_id: String,
    history: Vec<Message>,
) -> tokio::task::JoinHandle<()>
where
    S: Stream<Item = Bytes> + Send + 'static,
{
    tokio::spawn(async move {
        let id = chat_id.clone();
        if let Err(e) = persist_frames(frames, store, chat_id, history).await {
            tracing::warn!(chat_id = %id, error = %e, "failed to persist conversation");
        }
    })
}

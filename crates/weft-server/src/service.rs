use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::{stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use weft_agent_loop::{run_loop_stream, AgentConfig};
use weft_contract::{ConversationStore, Message, ToolRegistry};
use weft_protocol_ui_stream::{create_ui_message_stream, encode_stream, UiStreamEncoder};

use crate::fanout::tee;
use crate::persist::spawn_persist;
use crate::session::{StreamRegistry, StreamSession};

#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
    pub sessions: Arc<StreamRegistry>,
    pub store: Arc<dyn ConversationStore>,
}

impl AppState {
    pub fn new(chat: ChatService, store: Arc<dyn ConversationStore>) -> Self {
        Self {
            chat: Arc::new(chat),
            sessions: Arc::new(StreamRegistry::new()),
            store,
        }
    }

    /// Replace the session registry with one keeping completed sessions for
    /// `retention`.
    #[must_use]
    pub fn with_session_retention(mut self, retention: Duration) -> Self {
        self.sessions = Arc::new(StreamRegistry::with_retention(retention));
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("chat not found: {0}")]
    ChatNotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = match &self {
            ApiError::ChatNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (code, body).into_response()
    }
}

/// Runs chat turns into stream sessions.
#[derive(Clone)]
pub struct ChatService {
    agent: AgentConfig,
    tools: ToolRegistry,
    persist: bool,
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("agent", &self.agent)
            .field("tools", &self.tools)
            .field("persist", &self.persist)
            .finish()
    }
}

impl ChatService {
    pub fn new(agent: AgentConfig, tools: ToolRegistry) -> Self {
        Self {
            agent,
            tools,
            persist: true,
        }
    }

    #[must_use]
    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Start generation for `messages`, recording every frame into `session`.
    ///
    /// The run is driven by background tasks and outlives any client
    /// connection; only cancelling the session stops it. Once the run ends
    /// the session is handed to `sessions` for expiry.
    pub fn start_run(
        &self,
        chat_id: &str,
        sessions: Arc<StreamRegistry>,
        session: Arc<StreamSession>,
        messages: Vec<Message>,
        store: Arc<dyn ConversationStore>,
    ) {
        let events = run_loop_stream(
            self.agent.clone(),
            self.tools.clone(),
            messages.clone(),
            Some(session.cancellation_token()),
        );

        let ui = create_ui_message_stream(move |writer| async move {
            let mut encoder = UiStreamEncoder::new();
            writer.merge(events.flat_map(move |event| stream::iter(encoder.on_agent_event(&event))));
            Ok::<(), Infallible>(())
        });
        let frames = encode_stream(ui);

        let live = if self.persist {
            let (live, durable) = tee(frames);
            spawn_persist(durable, store, chat_id.to_string(), messages);
            live.boxed()
        } else {
            frames.boxed()
        };

        let chat_id = chat_id.to_string();
        tokio::spawn(async move {
            let mut live = live;
            let mut recorded = 0usize;
            while let Some(frame) = live.next().await {
                if !session.append(frame) {
                    tracing::debug!(chat_id = %chat_id, "session closed; stopping recorder");
                    return;
                }
                recorded += 1;
            }
            session.complete();
            tracing::info!(chat_id = %chat_id, frames = recorded, "chat run recorded");
            sessions.expire_after_retention(session);
        });
    }
}

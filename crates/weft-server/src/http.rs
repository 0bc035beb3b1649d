use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use weft_contract::{Conversation, Message};
use weft_protocol_ui_stream::{RUN_ID_HEADER, UI_MESSAGE_STREAM_HEADER, UI_MESSAGE_STREAM_VERSION};

use crate::service::{ApiError, AppState};
use crate::session::{Acquired, StreamSession};

/// Health endpoint path.
pub const HEALTH_PATH: &str = "/health";
/// Chat run endpoint: POST starts, GET reports status, DELETE cancels.
pub const CHAT_PATH: &str = "/api/chat/:chat_id";
/// Resume endpoint for a chat's stream.
pub const CHAT_STREAM_PATH: &str = "/api/chat/:chat_id/stream";
/// Persisted conversation.
pub const CHAT_MESSAGES_PATH: &str = "/api/chat/:chat_id/messages";

pub fn health_routes() -> Router<AppState> {
    Router::new().route(HEALTH_PATH, get(health))
}

pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route(
            CHAT_PATH,
            get(chat_status).post(start_chat).delete(cancel_chat),
        )
        .route(CHAT_STREAM_PATH, get(resume_stream))
        .route(CHAT_MESSAGES_PATH, get(chat_messages))
}

/// Full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(chat_routes())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatStatusResponse {
    pub in_progress: bool,
    pub completed: bool,
}

#[derive(Debug, Deserialize)]
struct StreamParams {
    #[serde(default)]
    offset: usize,
    /// Run the offset was counted in; a different current run is not served.
    run: Option<String>,
}

fn validate_chat_id(chat_id: &str) -> Result<(), ApiError> {
    if chat_id.trim().is_empty() {
        return Err(ApiError::BadRequest("chat id cannot be empty".to_string()));
    }
    Ok(())
}

async fn start_chat(
    State(st): State<AppState>,
    Path(chat_id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    validate_chat_id(&chat_id)?;
    if req.messages.is_empty() {
        return Err(ApiError::BadRequest(
            "request must include at least one message".to_string(),
        ));
    }

    let session = match st.sessions.get_or_create(&chat_id) {
        Acquired::Started(session) => {
            tracing::info!(chat_id = %chat_id, messages = req.messages.len(), "starting chat run");
            st.chat.start_run(
                &chat_id,
                st.sessions.clone(),
                session.clone(),
                req.messages,
                st.store.clone(),
            );
            session
        }
        Acquired::Attached(session) => {
            tracing::info!(chat_id = %chat_id, "run in progress; attaching from start");
            session
        }
    };
    Ok(session_response(&session, 0))
}

async fn chat_status(
    State(st): State<AppState>,
    Path(chat_id): Path<String>,
) -> Json<ChatStatusResponse> {
    let state = st.sessions.state(&chat_id);
    Json(ChatStatusResponse {
        in_progress: state.in_progress,
        completed: state.completed,
    })
}

async fn resume_stream(
    State(st): State<AppState>,
    Path(chat_id): Path<String>,
    Query(params): Query<StreamParams>,
) -> Response {
    let Some(session) = st.sessions.get(&chat_id) else {
        return StatusCode::NO_CONTENT.into_response();
    };
    if let Some(run) = params.run.as_deref() {
        if run != session.run_id() {
            tracing::debug!(chat_id = %chat_id, run, current = %session.run_id(), "resume for a replaced run");
            return StatusCode::NO_CONTENT.into_response();
        }
    }
    tracing::debug!(chat_id = %chat_id, offset = params.offset, "resuming stream");
    session_response(&session, params.offset)
}

async fn cancel_chat(
    State(st): State<AppState>,
    Path(chat_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if st.sessions.cancel(&chat_id) {
        tracing::info!(chat_id = %chat_id, "chat run cancelled");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::ChatNotFound(chat_id))
    }
}

async fn chat_messages(
    State(st): State<AppState>,
    Path(chat_id): Path<String>,
) -> Result<Json<Conversation>, ApiError> {
    validate_chat_id(&chat_id)?;
    let Some(conversation) = st
        .store
        .load(&chat_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
    else {
        return Err(ApiError::ChatNotFound(chat_id));
    };
    Ok(Json(conversation))
}

/// SSE response following `session` from frame `offset`, tagged with its run id.
fn session_response(session: &Arc<StreamSession>, offset: usize) -> Response {
    let mut response = sse_response(session.attach(offset));
    if let Ok(run_id) = HeaderValue::from_str(session.run_id()) {
        response.headers_mut().insert(RUN_ID_HEADER, run_id);
    }
    response
}

pub fn sse_response<S>(frames: S) -> Response
where
    S: Stream<Item = Bytes> + Send + 'static,
{
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(
        UI_MESSAGE_STREAM_HEADER,
        HeaderValue::from_static(UI_MESSAGE_STREAM_VERSION),
    );
    let body = Body::from_stream(frames.map(Ok::<Bytes, Infallible>));
    (headers, body).into_response()
}

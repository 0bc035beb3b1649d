#![allow(dead_code)]

use async_trait::async_trait;
use genai::chat::{
    ChatOptions, ChatRequest, ChatStreamEvent, MessageContent, StreamChunk,
    StreamEnd, ToolChunk, ToolCall,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use weft_agent_loop::{AgentConfig, LlmEventStream, LlmExecutor, StopConditionSpec};
use weft_contract::ToolRegistry;
use weft_server::service::{AppState, ChatService};
use weft_store_adapters::MemoryStore;

/// One scripted model turn.
#[derive(Clone, Default)]
pub struct Turn {
    pub chunks: Vec<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl Turn {
    pub fn text(text: &str) -> Self {
        Self {
            chunks: vec![text.to_string()],
            ..Default::default()
        }
    }

    pub fn chunks(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn tool_call(call_id: &str, name: &str, args: Value) -> Self {
        Self::default().and_tool_call(call_id, name, args)
    }

    pub fn and_tool_call(mut self, call_id: &str, name: &str, args: Value) -> Self {
        self.tool_calls.push(ToolCall {
            call_id: call_id.to_string(),
            fn_name: name.to_string(),
            fn_arguments: args,
            thought_signatures: None,
        });
        self
    }
}

/// Streams scripted turns in order, then plain "done" text.
pub struct ScriptedLlm {
    turns: Mutex<VecDeque<Turn>>,
    calls: AtomicUsize,
    chunk_delay: Duration,
}

impl ScriptedLlm {
    pub fn new(turns: Vec<Turn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            calls: AtomicUsize::new(0),
            chunk_delay: Duration::ZERO,
        }
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmExecutor for ScriptedLlm {
    async fn exec_chat_stream_events(
        &self,
        _model: &str,
        _chat_req: ChatRequest,
        _options: Option<&ChatOptions>,
    ) -> genai::Result<LlmEventStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let turn = self
            .turns
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Turn::text("done"));

        let mut events: Vec<genai::Result<ChatStreamEvent>> = vec![Ok(ChatStreamEvent::Start)];
        for chunk in &turn.chunks {
            events.push(Ok(ChatStreamEvent::Chunk(StreamChunk {
                content: chunk.clone(),
            })));
        }
        for tc in &turn.tool_calls {
            events.push(Ok(ChatStreamEvent::ToolCallChunk(ToolChunk {
                tool_call: tc.clone(),
            })));
        }
        events.push(Ok(ChatStreamEvent::End(StreamEnd {
            captured_content: if turn.tool_calls.is_empty() {
                None
            } else {
                Some(MessageContent::from_tool_calls(turn.tool_calls))
            },
            ..Default::default()
        })));

        let delay = self.chunk_delay;
        let stream = futures::StreamExt::then(futures::stream::iter(events), move |event| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            event
        });
        Ok(Box::pin(stream))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// App state over a memory store, stopping after the first tool step.
pub fn app_state(llm: Arc<ScriptedLlm>, tools: ToolRegistry) -> (AppState, Arc<MemoryStore>) {
    let agent = AgentConfig::new("test-model")
        .with_llm_executor(llm)
        .with_stop_condition(StopConditionSpec::MaxRounds { rounds: 3 });
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(ChatService::new(agent, tools), store.clone());
    (state, store)
}

/// Decode an SSE body into its JSON payloads, `[DONE]` kept as a string.
pub fn sse_payloads(body: &[u8]) -> Vec<Value> {
    std::str::from_utf8(body)
        .unwrap()
        .split("\n\n")
        .filter_map(|frame| frame.strip_prefix("data: "))
        .map(|payload| {
            serde_json::from_str(payload).unwrap_or_else(|_| Value::String(payload.to_string()))
        })
        .collect()
}

pub fn types(payloads: &[Value]) -> Vec<String> {
    payloads
        .iter()
        .map(|p| match p {
            Value::String(s) => s.clone(),
            other => other["type"].as_str().unwrap_or_default().to_string(),
        })
        .collect()
}

#![allow(dead_code)]

use async_trait::async_trait;
use genai::chat::{
    ChatOptions, ChatRequest, ChatStreamEvent, MessageContent, StreamChunk,
    StreamEnd, ToolCall, ToolChunk,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;
use weft_agent_loop::{AgentConfig, LlmEventStream, LlmExecutor, StopConditionSpec};
use weft_contract::{DataKind, ToolCallContext, ToolError, ToolRegistry, ToolResult, TypedTool};
use weft_protocol_ui_stream::UIStreamEvent;
use weft_server::http::router;
use weft_server::service::{AppState, ChatService};
use weft_store_adapters::MemoryStore;

/// Model that requests one tool call per scripted turn, then answers "done".
pub struct ScriptedLlm {
    turns: Mutex<VecDeque<ToolCall>>,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn calling(tool: &str, args: Value, times: usize) -> Self {
        let turns = (0..times)
            .map(|i| ToolCall {
                call_id: format!("call_{i}"),
                fn_name: tool.to_string(),
                fn_arguments: args.clone(),
                thought_signatures: None,
            })
            .collect();
        Self {
            turns: Mutex::new(turns),
            calls: AtomicUsize::new(0),
        }
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
        let call = self.turns.lock().unwrap().pop_front();
        let events: Vec<genai::Result<ChatStreamEvent>> = match call {
            Some(call) => vec![
                Ok(ChatStreamEvent::Start),
                Ok(ChatStreamEvent::ToolCallChunk(ToolChunk {
                    tool_call: call.clone(),
                })),
                Ok(ChatStreamEvent::End(StreamEnd {
                    captured_content: Some(MessageContent::from_tool_calls(vec![call])),
                    ..Default::default()
                })),
            ],
            None => vec![
                Ok(ChatStreamEvent::Start),
                Ok(ChatStreamEvent::Chunk(StreamChunk {
                    content: "done".to_string(),
                })),
                Ok(ChatStreamEvent::End(StreamEnd::default())),
            ],
        };
        Ok(Box::pin(futures::stream::iter(events)))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ForecastArgs {
    pub city: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ForecastStep {
    pub city: String,
    pub step: u32,
}

/// Emits `parts` `data-weather` payloads, one per `interval`.
pub struct SlowForecastTool {
    pub parts: u32,
    pub interval: Duration,
}

#[async_trait]
impl TypedTool for SlowForecastTool {
    type Args = ForecastArgs;

    fn tool_id(&self) -> &str {
        "slowForecast"
    }

    fn name(&self) -> &str {
        "Slow Forecast"
    }

    fn description(&self) -> &str {
        "Streams a forecast in steps"
    }

    fn data_kinds(&self) -> Vec<DataKind> {
        vec![DataKind::typed::<ForecastStep>("weather")]
    }

    async fn execute(&self, args: ForecastArgs, ctx: &ToolCallContext) -> Result<ToolResult, ToolError> {
        for step in 1..=self.parts {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = ctx.cancelled() => return Err(ToolError::Cancelled),
            }
            ctx.emit(
                "weather",
                ForecastStep {
                    city: args.city.clone(),
                    step,
                },
            )?;
        }
        Ok(ToolResult::success(
            "slowForecast",
            json!({ "city": args.city, "steps": self.parts }),
        ))
    }
}

/// Serve a forecast-only agent on an ephemeral port.
pub async fn spawn_server(llm: Arc<ScriptedLlm>, parts: u32, interval: Duration) -> Url {
    let tools = ToolRegistry::new()
        .with_tool(Arc::new(SlowForecastTool { parts, interval }))
        .unwrap();
    let agent = AgentConfig::new("test-model")
        .with_llm_executor(llm)
        .with_stop_condition(StopConditionSpec::StopOnTool {
            tool_name: "slowForecast".into(),
        })
        .with_stop_condition(StopConditionSpec::MaxRounds { rounds: 3 });
    let state = AppState::new(
        ChatService::new(agent, tools).with_persist(false),
        Arc::new(MemoryStore::new()),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    Url::parse(&format!("http://{addr}")).unwrap()
}

pub fn forecast_llm(times: usize) -> Arc<ScriptedLlm> {
    Arc::new(ScriptedLlm::calling(
        "slowForecast",
        json!({ "city": "Paris" }),
        times,
    ))
}

pub fn is_weather(event: &UIStreamEvent) -> bool {
    matches!(event, UIStreamEvent::Data { data_type, .. } if data_type == "data-weather")
}

pub fn is_finish(event: &UIStreamEvent) -> bool {
    matches!(event, UIStreamEvent::Finish { .. })
}

use super::*;
use crate::contracts::tool::{DataKind, Tool, ToolCallContext, ToolDescriptor, ToolError, ToolResult};
use crate::contracts::StoppedReason;
use crate::engine::stop_conditions::StopConditionSpec;
use crate::engine::tool_execution::ToolExecutionMode;
use async_trait::async_trait;
use futures::StreamExt;
use genai::chat::{
    ChatOptions, ChatStreamEvent, MessageContent, StreamChunk, StreamEnd, ToolChunk, Usage,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
struct MockResponse {
    text: String,
    tool_calls: Vec<genai::chat::ToolCall>,
    usage: Option<Usage>,
}

impl MockResponse {
    fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Default::default()
        }
    }

    fn with_tool_call(mut self, call_id: &str, name: &str, args: Value) -> Self {
        self.tool_calls.push(genai::chat::ToolCall {
            call_id: call_id.to_string(),
            fn_name: name.to_string(),
            fn_arguments: args,
            thought_signatures: None,
        });
        self
    }
}

/// Mock provider that returns pre-configured responses in order.
/// After all responses are consumed, returns text-only (triggering NaturalEnd).
struct MockStreamProvider {
    responses: Mutex<Vec<MockResponse>>,
    requests_seen: Mutex<Vec<usize>>,
}

impl MockStreamProvider {
    fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests_seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LlmExecutor for MockStreamProvider {
    async fn exec_chat_stream_events(
        &self,
        _model: &str,
        chat_req: genai::chat::ChatRequest,
        _options: Option<&ChatOptions>,
    ) -> genai::Result<LlmEventStream> {
        self.requests_seen
            .lock()
            .unwrap()
            .push(chat_req.messages.len());
        let resp = {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                MockResponse::text("done")
            } else {
                responses.remove(0)
            }
        };

        let mut events: Vec<genai::Result<ChatStreamEvent>> = Vec::new();
        events.push(Ok(ChatStreamEvent::Start));

        if !resp.text.is_empty() {
            events.push(Ok(ChatStreamEvent::Chunk(StreamChunk {
                content: resp.text.clone(),
            })));
        }

        for tc in &resp.tool_calls {
            events.push(Ok(ChatStreamEvent::ToolCallChunk(ToolChunk {
                tool_call: tc.clone(),
            })));
        }

        let end = StreamEnd {
            captured_content: if resp.tool_calls.is_empty() {
                None
            } else {
                Some(MessageContent::from_tool_calls(resp.tool_calls))
            },
            captured_usage: resp.usage,
            ..Default::default()
        };
        events.push(Ok(ChatStreamEvent::End(end)));

        Ok(Box::pin(futures::stream::iter(events)))
    }

    fn name(&self) -> &'static str {
        "mock_stream"
    }
}

/// Provider whose stream fails to start.
struct FailingStartProvider;

#[async_trait]
impl LlmExecutor for FailingStartProvider {
    async fn exec_chat_stream_events(
        &self,
        _model: &str,
        _chat_req: genai::chat::ChatRequest,
        _options: Option<&ChatOptions>,
    ) -> genai::Result<LlmEventStream> {
        Err(genai::Error::Internal("429 rate limit".to_string()))
    }

    fn name(&self) -> &'static str {
        "failing_start"
    }
}

struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new("echo", "Echo", "Echo the input")
    }

    async fn execute(&self, args: Value, _ctx: &ToolCallContext) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::success("echo", args))
    }
}

struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new("failing", "Failing", "Always fails")
    }

    async fn execute(&self, _args: Value, _ctx: &ToolCallContext) -> Result<ToolResult, ToolError> {
        Err(ToolError::ExecutionFailed("upstream down".into()))
    }
}

/// Emits `data-progress` once, sleeps `delay_ms`, emits again, returns.
struct ProgressTool;

#[async_trait]
impl Tool for ProgressTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new("progress", "Progress", "Reports progress")
            .with_parameters(json!({
                "type": "object",
                "properties": {"delay_ms": {"type": "integer"}},
                "required": ["delay_ms"]
            }))
            .with_data_kind(DataKind::new(
                "progress",
                json!({
                    "type": "object",
                    "properties": {"step": {"type": "integer"}},
                    "required": ["step"]
                }),
            ))
    }

    async fn execute(&self, args: Value, ctx: &ToolCallContext) -> Result<ToolResult, ToolError> {
        let delay = args["delay_ms"].as_u64().unwrap_or(0);
        ctx.emit("progress", json!({"step": 1}))?;
        tokio::time::sleep(Duration::from_millis(delay)).await;
        ctx.emit("progress", json!({"step": 2}))?;
        Ok(ToolResult::success("progress", json!({"delay": delay})))
    }
}

/// Blocks until the run is cancelled.
struct BlockingTool;

#[async_trait]
impl Tool for BlockingTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new("blocking", "Blocking", "Waits for cancellation")
    }

    async fn execute(&self, _args: Value, ctx: &ToolCallContext) -> Result<ToolResult, ToolError> {
        ctx.cancelled().await;
        Err(ToolError::Cancelled)
    }
}

fn registry() -> ToolRegistry {
    ToolRegistry::new()
        .with_tool(Arc::new(EchoTool))
        .unwrap()
        .with_tool(Arc::new(FailingTool))
        .unwrap()
        .with_tool(Arc::new(ProgressTool))
        .unwrap()
        .with_tool(Arc::new(BlockingTool))
        .unwrap()
}

async fn run_mock_stream(provider: MockStreamProvider, config: AgentConfig) -> Vec<AgentEvent> {
    let config = config.with_llm_executor(Arc::new(provider));
    run_loop_stream(config, registry(), vec![Message::user("go")], None)
        .collect()
        .await
}

fn termination(events: &[AgentEvent]) -> Option<&TerminationReason> {
    events.iter().find_map(|e| match e {
        AgentEvent::RunFinish { termination, .. } => Some(termination),
        _ => None,
    })
}

fn assert_single_terminal_last(events: &[AgentEvent]) {
    let terminals = events.iter().filter(|e| e.is_terminal()).count();
    assert_eq!(terminals, 1, "events: {events:?}");
    assert!(events.last().is_some_and(AgentEvent::is_terminal));
}

fn done_ids(events: &[AgentEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            AgentEvent::ToolCallDone { id, .. } => Some(id.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_text_only_run_ends_naturally() {
    let events = run_mock_stream(
        MockStreamProvider::new(vec![MockResponse::text("hello")]),
        AgentConfig::new("mock"),
    )
    .await;

    assert!(matches!(events[0], AgentEvent::RunStart { .. }));
    assert_eq!(events[1], AgentEvent::StepStart { step: 0 });
    assert_eq!(
        events[2],
        AgentEvent::TextDelta {
            delta: "hello".into()
        }
    );
    assert_eq!(events[3], AgentEvent::StepEnd);
    match &events[4] {
        AgentEvent::RunFinish {
            result,
            termination,
            ..
        } => {
            assert_eq!(termination, &TerminationReason::NaturalEnd);
            assert_eq!(result, &Some(json!({"response": "hello"})));
        }
        other => panic!("expected RunFinish, got {other:?}"),
    }
    assert_single_terminal_last(&events);
}

#[tokio::test]
async fn test_tool_step_then_natural_end() {
    let provider = MockStreamProvider::new(vec![
        MockResponse::text("calling").with_tool_call("c1", "echo", json!({"x": 1})),
        MockResponse::text("all done"),
    ]);
    let events = run_mock_stream(provider, AgentConfig::new("mock")).await;

    let start = events
        .iter()
        .position(|e| matches!(e, AgentEvent::ToolCallStart { id, .. } if id == "c1"))
        .unwrap();
    let ready = events
        .iter()
        .position(|e| matches!(e, AgentEvent::ToolCallReady { id, .. } if id == "c1"))
        .unwrap();
    let done = events
        .iter()
        .position(|e| matches!(e, AgentEvent::ToolCallDone { id, .. } if id == "c1"))
        .unwrap();
    assert!(start < ready && ready < done);
    assert!(events.contains(&AgentEvent::StepStart { step: 1 }));
    assert_eq!(termination(&events), Some(&TerminationReason::NaturalEnd));
    assert_single_terminal_last(&events);
}

#[tokio::test]
async fn test_history_grows_across_steps() {
    let provider = Arc::new(MockStreamProvider::new(vec![
        MockResponse::default().with_tool_call("c1", "echo", json!({})),
    ]));
    let config = AgentConfig::new("mock")
        .with_system_prompt("sys")
        .with_llm_executor(provider.clone());
    let _: Vec<AgentEvent> = run_loop_stream(config, registry(), vec![Message::user("go")], None)
        .collect()
        .await;

    // system + user, then + assistant turn + tool response
    assert_eq!(*provider.requests_seen.lock().unwrap(), vec![2, 4]);
}

#[tokio::test]
async fn test_stop_on_tool_ends_after_that_step() {
    let provider = MockStreamProvider::new(vec![
        MockResponse::default().with_tool_call("c1", "echo", json!({})),
        MockResponse::text("should not run"),
    ]);
    let config = AgentConfig::new("mock").with_stop_conditions([
        StopConditionSpec::StopOnTool {
            tool_name: "echo".into(),
        },
        StopConditionSpec::MaxRounds { rounds: 3 },
    ]);
    let events = run_mock_stream(provider, config).await;

    assert_eq!(
        termination(&events),
        Some(&TerminationReason::Stopped(StoppedReason::with_detail(
            "tool_called",
            "echo"
        )))
    );
    assert!(!events.contains(&AgentEvent::StepStart { step: 1 }));
    assert_single_terminal_last(&events);
}

#[tokio::test]
async fn test_max_rounds_caps_tool_loop() {
    let provider = MockStreamProvider::new(vec![
        MockResponse::default().with_tool_call("c1", "echo", json!({})),
        MockResponse::default().with_tool_call("c2", "echo", json!({})),
        MockResponse::default().with_tool_call("c3", "echo", json!({})),
    ]);
    let config = AgentConfig::new("mock")
        .with_stop_condition(StopConditionSpec::MaxRounds { rounds: 2 });
    let events = run_mock_stream(provider, config).await;

    assert_eq!(done_ids(&events), vec!["c1", "c2"]);
    assert_eq!(
        termination(&events),
        Some(&TerminationReason::Stopped(StoppedReason::new(
            "max_rounds_reached"
        )))
    );
}

#[tokio::test]
async fn test_single_step_never_continues() {
    let provider = MockStreamProvider::new(vec![
        MockResponse::default().with_tool_call("c1", "echo", json!({})),
    ]);
    let config = AgentConfig::new("mock").with_stop_condition(StopConditionSpec::SingleStep);
    let events = run_mock_stream(provider, config).await;
    assert_eq!(
        termination(&events),
        Some(&TerminationReason::Stopped(StoppedReason::new("single_step")))
    );
}

#[tokio::test]
async fn test_tool_data_forwarded_before_done_with_call_id() {
    let provider = MockStreamProvider::new(vec![
        MockResponse::default().with_tool_call("p1", "progress", json!({"delay_ms": 5})),
    ]);
    let events = run_mock_stream(provider, AgentConfig::new("mock")).await;

    let data: Vec<(usize, &AgentEvent)> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, AgentEvent::ToolCallData { .. }))
        .collect();
    assert_eq!(data.len(), 2);
    for (_, event) in &data {
        match event {
            AgentEvent::ToolCallData { id, kind, .. } => {
                assert_eq!(id, "p1");
                assert_eq!(kind, "progress");
            }
            _ => unreachable!(),
        }
    }
    let done = events
        .iter()
        .position(|e| matches!(e, AgentEvent::ToolCallDone { .. }))
        .unwrap();
    assert!(data.iter().all(|(idx, _)| *idx < done));
}

#[tokio::test]
async fn test_parallel_tools_stream_live_and_finish_in_request_order() {
    let provider = MockStreamProvider::new(vec![MockResponse::default()
        .with_tool_call("slow", "progress", json!({"delay_ms": 80}))
        .with_tool_call("fast", "progress", json!({"delay_ms": 1}))]);
    let config = AgentConfig::new("mock").with_tool_execution_mode(ToolExecutionMode::Parallel);
    let events = run_mock_stream(provider, config).await;

    // The fast call's final emission lands before the slow call's.
    let final_step_of = |call: &str| {
        events
            .iter()
            .position(|e| {
                matches!(e, AgentEvent::ToolCallData { id, data, .. } if id == call && data["step"] == 2)
            })
            .unwrap()
    };
    assert!(final_step_of("fast") < final_step_of("slow"));
    assert_eq!(done_ids(&events), vec!["slow", "fast"]);
}

#[tokio::test]
async fn test_sequential_tools_run_in_request_order() {
    let provider = MockStreamProvider::new(vec![MockResponse::default()
        .with_tool_call("first", "progress", json!({"delay_ms": 30}))
        .with_tool_call("second", "progress", json!({"delay_ms": 1}))]);
    let events = run_mock_stream(provider, AgentConfig::new("mock")).await;

    let data_ids: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            AgentEvent::ToolCallData { id, .. } => Some(id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(data_ids, vec!["first", "first", "second", "second"]);
    assert_eq!(done_ids(&events), vec!["first", "second"]);
}

#[tokio::test]
async fn test_tool_error_is_reported_and_run_continues() {
    let provider = MockStreamProvider::new(vec![
        MockResponse::default()
            .with_tool_call("bad", "failing", json!({}))
            .with_tool_call("missing", "nope", json!({})),
    ]);
    let events = run_mock_stream(provider, AgentConfig::new("mock")).await;

    let errors: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            AgentEvent::ToolCallDone { result, .. } if result.is_error() => {
                result.data["error"]["code"].as_str()
            }
            _ => None,
        })
        .collect();
    assert_eq!(errors, vec!["execution_failed", "not_found"]);
    assert_eq!(termination(&events), Some(&TerminationReason::NaturalEnd));
}

#[tokio::test]
async fn test_fatal_tool_error_ends_with_single_error() {
    let provider = MockStreamProvider::new(vec![
        MockResponse::default().with_tool_call("bad", "failing", json!({})),
    ]);
    let config = AgentConfig::new("mock").with_tool_errors_fatal(true);
    let events = run_mock_stream(provider, config).await;

    assert!(termination(&events).is_none());
    assert!(matches!(events.last(), Some(AgentEvent::Error { message }) if message.contains("failing")));
    assert_eq!(done_ids(&events), vec!["bad"]);
    assert_single_terminal_last(&events);
}

#[tokio::test]
async fn test_llm_start_failure_ends_with_error() {
    let config = AgentConfig::new("mock").with_llm_executor(Arc::new(FailingStartProvider));
    let events: Vec<AgentEvent> =
        run_loop_stream(config, registry(), vec![Message::user("go")], None)
            .collect()
            .await;

    assert!(matches!(events.last(), Some(AgentEvent::Error { message }) if message.contains("rate limit")));
    assert!(termination(&events).is_none());
    assert_single_terminal_last(&events);
}

#[tokio::test]
async fn test_cancellation_during_tool_finishes_cancelled() {
    let provider = MockStreamProvider::new(vec![
        MockResponse::default().with_tool_call("b1", "blocking", json!({})),
    ]);
    let config = AgentConfig::new("mock").with_llm_executor(Arc::new(provider));
    let token = CancellationToken::new();
    let mut stream = run_loop_stream(
        config,
        registry(),
        vec![Message::user("go")],
        Some(token.clone()),
    );

    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        if matches!(event, AgentEvent::ToolCallReady { .. }) {
            token.cancel();
        }
        events.push(event);
    }

    assert_eq!(termination(&events), Some(&TerminationReason::Cancelled));
    assert_single_terminal_last(&events);
}

#[tokio::test]
async fn test_cancelled_before_start_emits_no_step() {
    let token = CancellationToken::new();
    token.cancel();
    let config = AgentConfig::new("mock")
        .with_llm_executor(Arc::new(MockStreamProvider::new(vec![MockResponse::text("x")])));
    let events: Vec<AgentEvent> =
        run_loop_stream(config, registry(), vec![Message::user("go")], Some(token))
            .collect()
            .await;

    assert_eq!(events.len(), 2);
    assert_eq!(termination(&events), Some(&TerminationReason::Cancelled));
}

#[test]
fn test_agent_config_debug_names_policies() {
    let config = AgentConfig::new("gpt-4.1-mini")
        .with_stop_condition(StopConditionSpec::MaxRounds { rounds: 3 });
    let debug = format!("{config:?}");
    assert!(debug.contains("max_rounds"));
    assert!(debug.contains("genai_client(default)"));
}

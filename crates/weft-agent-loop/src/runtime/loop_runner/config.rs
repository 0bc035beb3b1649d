use crate::engine::stop_conditions::{StopConditionSpec, StopPolicy};
use crate::engine::tool_execution::ToolExecutionMode;
use async_trait::async_trait;
use genai::chat::ChatOptions;
use genai::Client;
use std::sync::Arc;

/// Boxed stream of LLM chat events.
pub type LlmEventStream = std::pin::Pin<
    Box<dyn futures::Stream<Item = Result<genai::chat::ChatStreamEvent, genai::Error>> + Send>,
>;

/// Abstraction over LLM inference backends.
///
/// The default implementation ([`GenaiLlmExecutor`]) delegates to
/// `genai::Client`.
#[async_trait]
pub trait LlmExecutor: Send + Sync {
    /// Run a streaming chat completion, returning a boxed event stream.
    async fn exec_chat_stream_events(
        &self,
        model: &str,
        chat_req: genai::chat::ChatRequest,
        options: Option<&ChatOptions>,
    ) -> genai::Result<LlmEventStream>;

    /// Stable label for logging / debug output.
    fn name(&self) -> &'static str;
}

/// Default LLM executor backed by `genai::Client`.
#[derive(Clone, Default)]
pub struct GenaiLlmExecutor {
    client: Client,
}

impl GenaiLlmExecutor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl std::fmt::Debug for GenaiLlmExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenaiLlmExecutor").finish()
    }
}

#[async_trait]
impl LlmExecutor for GenaiLlmExecutor {
    async fn exec_chat_stream_events(
        &self,
        model: &str,
        chat_req: genai::chat::ChatRequest,
        options: Option<&ChatOptions>,
    ) -> genai::Result<LlmEventStream> {
        let resp = self
            .client
            .exec_chat_stream(model, chat_req, options)
            .await?;
        Ok(Box::pin(resp.stream))
    }

    fn name(&self) -> &'static str {
        "genai_client"
    }
}

/// Configuration of one generation loop.
#[derive(Clone)]
pub struct AgentConfig {
    /// Identifier used in logs.
    pub id: String,
    /// Model identifier (e.g. "gpt-4.1-mini").
    pub model: String,
    /// System prompt prepended to every request.
    pub system_prompt: String,
    /// How tool calls of one step are scheduled.
    pub tool_execution_mode: ToolExecutionMode,
    /// Chat options for the LLM.
    pub chat_options: Option<ChatOptions>,
    /// Continuation policies, evaluated in order after each tool step.
    ///
    /// Empty means keep going while the model requests tools.
    pub stop_conditions: Vec<Arc<dyn StopPolicy>>,
    /// End the run with an error as soon as any tool call fails.
    pub tool_errors_fatal: bool,
    /// Optional LLM executor override.
    ///
    /// When not set, the loop uses [`GenaiLlmExecutor`] with `Client::default()`.
    pub llm_executor: Option<Arc<dyn LlmExecutor>>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            model: "gpt-4.1-mini".to_string(),
            system_prompt: String::new(),
            tool_execution_mode: ToolExecutionMode::Sequential,
            chat_options: Some(
                ChatOptions::default()
                    .with_capture_usage(true)
                    .with_capture_tool_calls(true),
            ),
            stop_conditions: Vec::new(),
            tool_errors_fatal: false,
            llm_executor: None,
        }
    }
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("id", &self.id)
            .field("model", &self.model)
            .field(
                "system_prompt",
                &format!("[{} chars]", self.system_prompt.len()),
            )
            .field("tool_execution_mode", &self.tool_execution_mode)
            .field("chat_options", &self.chat_options)
            .field(
                "stop_conditions",
                &self
                    .stop_conditions
                    .iter()
                    .map(|p| p.id().to_string())
                    .collect::<Vec<_>>(),
            )
            .field("tool_errors_fatal", &self.tool_errors_fatal)
            .field(
                "llm_executor",
                &self
                    .llm_executor
                    .as_ref()
                    .map(|executor| executor.name())
                    .unwrap_or("genai_client(default)"),
            )
            .finish()
    }
}

impl AgentConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    #[must_use]
    pub fn with_tool_execution_mode(mut self, mode: ToolExecutionMode) -> Self {
        self.tool_execution_mode = mode;
        self
    }

    #[must_use]
    pub fn with_chat_options(mut self, options: ChatOptions) -> Self {
        self.chat_options = Some(options);
        self
    }

    /// Append one declarative continuation policy.
    #[must_use]
    pub fn with_stop_condition(mut self, spec: StopConditionSpec) -> Self {
        self.stop_conditions.push(spec.into_policy());
        self
    }

    /// Append declarative continuation policies in order.
    #[must_use]
    pub fn with_stop_conditions(mut self, specs: impl IntoIterator<Item = StopConditionSpec>) -> Self {
        self.stop_conditions
            .extend(specs.into_iter().map(StopConditionSpec::into_policy));
        self
    }

    /// Append a custom continuation policy.
    #[must_use]
    pub fn with_stop_policy(mut self, policy: Arc<dyn StopPolicy>) -> Self {
        self.stop_conditions.push(policy);
        self
    }

    #[must_use]
    pub fn with_tool_errors_fatal(mut self, fatal: bool) -> Self {
        self.tool_errors_fatal = fatal;
        self
    }

    /// Set LLM executor.
    #[must_use]
    pub fn with_llm_executor(mut self, executor: Arc<dyn LlmExecutor>) -> Self {
        self.llm_executor = Some(executor);
        self
    }

    pub(super) fn llm_executor_for_run(&self) -> Arc<dyn LlmExecutor> {
        self.llm_executor
            .clone()
            .unwrap_or_else(|| Arc::new(GenaiLlmExecutor::new(Client::default())))
    }
}

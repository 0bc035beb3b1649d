use async_trait::async_trait;
use futures::StreamExt;
use genai::chat::{ChatRequest, ChatStreamEvent};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use weft_agent_loop::LlmExecutor;
use weft_contract::{DataKind, ToolCallContext, ToolError, ToolResult, TypedTool};

pub const WRITER_SYSTEM_PROMPT: &str =
    "You are an expert writer. Follow the users instructions. Write no more than 100 words";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WritingArgs {
    /// What to write.
    pub prompt: String,
}

/// Payload of `data-generateWriting`: the text written so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WritingData {
    pub text: String,
}

/// Writes with a nested model stream, publishing the text one character at
/// a time.
pub struct WritingTool {
    llm: Arc<dyn LlmExecutor>,
    model: String,
}

impl WritingTool {
    pub fn new(llm: Arc<dyn LlmExecutor>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }
}

#[async_trait]
impl TypedTool for WritingTool {
    type Args = WritingArgs;

    fn tool_id(&self) -> &str {
        "generateWriting"
    }

    fn name(&self) -> &str {
        "Generate Writing"
    }

    fn description(&self) -> &str {
        "Write something (email, poem etc.)."
    }

    fn data_kinds(&self) -> Vec<DataKind> {
        vec![DataKind::typed::<WritingData>("generateWriting")]
    }

    async fn execute(&self, args: WritingArgs, ctx: &ToolCallContext) -> Result<ToolResult, ToolError> {
        let request = ChatRequest::from_user(args.prompt.clone()).with_system(WRITER_SYSTEM_PROMPT);
        let mut stream = self
            .llm
            .exec_chat_stream_events(&self.model, request, None)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("writer model failed: {e}")))?;

        let mut text = String::new();
        loop {
            let event = tokio::select! {
                event = stream.next() => event,
                _ = ctx.cancelled() => return Err(ToolError::Cancelled),
            };
            let Some(event) = event else { break };
            match event {
                Ok(ChatStreamEvent::Chunk(chunk)) => {
                    for ch in chunk.content.chars() {
                        text.push(ch);
                        ctx.emit("generateWriting", WritingData { text: text.clone() })?;
                    }
                }
                Ok(ChatStreamEvent::End(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(ToolError::ExecutionFailed(format!(
                        "writer stream failed: {e}"
                    )))
                }
            }
        }

        tracing::debug!(call_id = %ctx.call_id(), chars = text.chars().count(), "writing finished");
        Ok(ToolResult::success(
            "generateWriting",
            json!({ "prompt": args.prompt, "text": text }),
        ))
    }
}

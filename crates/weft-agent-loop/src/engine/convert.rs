//! Pure functions for converting between weft and genai types.

use crate::contracts::tool::{ToolDescriptor, ToolRegistry, ToolResult};
use crate::contracts::{Message, Part, Role, ToolCall, ToolInvocationState};
use genai::chat::{ChatMessage, ChatRequest, ContentPart, MessageContent, ToolResponse};
use serde_json::Value;

/// Convert a ToolDescriptor to a genai Tool.
pub fn to_genai_tool(desc: &ToolDescriptor) -> genai::chat::Tool {
    genai::chat::Tool::new(&desc.id)
        .with_description(&desc.description)
        .with_schema(desc.parameters.clone())
}

fn to_genai_call(call: &ToolCall) -> genai::chat::ToolCall {
    genai::chat::ToolCall {
        call_id: call.id.clone(),
        fn_name: call.name.clone(),
        fn_arguments: call.arguments.clone(),
        thought_signatures: None,
    }
}

/// Assistant turn carrying optional text plus the tool calls it requested.
pub fn assistant_turn(text: &str, calls: &[ToolCall]) -> ChatMessage {
    if calls.is_empty() {
        return ChatMessage::assistant(text);
    }
    let mut content = MessageContent::from(text);
    for call in calls {
        content.push(ContentPart::ToolCall(to_genai_call(call)));
    }
    ChatMessage::assistant(content)
}

/// Tool response message for one finished call.
pub fn tool_response(call_id: &str, result: &ToolResult) -> ChatMessage {
    let content = serde_json::to_string(result)
        .unwrap_or_else(|_| result.message.clone().unwrap_or_default());
    ChatMessage::from(ToolResponse::new(call_id, content))
}

/// Convert one conversation message into the chat messages the model sees.
///
/// Assistant messages expand into the assistant turn followed by one tool
/// response per finished invocation. Invocations that never finished are
/// dropped, as are `data-<kind>` parts.
pub fn to_chat_messages(msg: &Message) -> Vec<ChatMessage> {
    match msg.role {
        Role::User => vec![ChatMessage::user(msg.text())],
        Role::ToolSystem => vec![ChatMessage::system(msg.text())],
        Role::Assistant => {
            let mut calls = Vec::new();
            let mut responses = Vec::new();
            for part in &msg.parts {
                let Part::ToolInvocation {
                    tool_call_id,
                    tool_name,
                    state,
                    input,
                    output,
                    error_text,
                } = part
                else {
                    continue;
                };
                let content = match state {
                    ToolInvocationState::Done => {
                        output.clone().unwrap_or(Value::Null).to_string()
                    }
                    ToolInvocationState::Error => {
                        error_text.clone().unwrap_or_else(|| "tool failed".to_string())
                    }
                    ToolInvocationState::Pending | ToolInvocationState::Running => continue,
                };
                calls.push(ToolCall::new(
                    tool_call_id,
                    tool_name,
                    input.clone().unwrap_or(Value::Null),
                ));
                responses.push(ChatMessage::from(ToolResponse::new(
                    tool_call_id.as_str(),
                    content,
                )));
            }

            let text = msg.text();
            let mut out = Vec::with_capacity(responses.len() + 1);
            if !text.is_empty() || !calls.is_empty() {
                out.push(assistant_turn(&text, &calls));
            }
            out.extend(responses);
            out
        }
    }
}

/// Build a genai ChatRequest from the system prompt, history, and registry.
pub fn build_request(
    system_prompt: &str,
    history: &[ChatMessage],
    registry: &ToolRegistry,
) -> ChatRequest {
    let mut chat_messages = Vec::with_capacity(history.len() + 1);
    if !system_prompt.is_empty() {
        chat_messages.push(ChatMessage::system(system_prompt));
    }
    chat_messages.extend(history.iter().cloned());

    let genai_tools: Vec<genai::chat::Tool> =
        registry.descriptors().iter().map(to_genai_tool).collect();

    let mut request = ChatRequest::new(chat_messages);
    if !genai_tools.is_empty() {
        request = request.with_tools(genai_tools);
    }
    request
}

//! Collecting one streamed model response.
//!
//! [`StreamCollector`] folds genai stream events into the step's text and the
//! ordered list of requested tool calls, surfacing [`StreamOutput`]s the loop
//! turns into agent events.

use crate::contracts::ToolCall;
use genai::chat::{ChatStreamEvent, Usage};
use serde_json::Value;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Partial tool call being collected during streaming.
#[derive(Debug, Clone)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Final result of one streamed response.
#[derive(Debug, Clone, Default)]
pub struct StreamResult {
    pub text: String,
    /// Tool calls in the order the model first mentioned them.
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
}

impl StreamResult {
    /// Whether the model requested at least one tool call.
    pub fn needs_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Output event from stream processing.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutput {
    TextDelta(String),
    ToolCallStart { id: String, name: String },
}

fn raw_arguments(value: &Value) -> String {
    // genai wraps streamed argument text in Value::String.
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Collector for streaming LLM responses.
#[derive(Debug, Default)]
pub struct StreamCollector {
    text: String,
    tool_calls: HashMap<String, PartialToolCall>,
    tool_call_order: Vec<String>,
    usage: Option<Usage>,
}

impl StreamCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, call_id: &str) -> &mut PartialToolCall {
        match self.tool_calls.entry(call_id.to_string()) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                self.tool_call_order.push(call_id.to_string());
                e.insert(PartialToolCall {
                    id: call_id.to_string(),
                    name: String::new(),
                    arguments: String::new(),
                })
            }
        }
    }

    /// Process a stream event and optionally return an output event.
    pub fn process(&mut self, event: ChatStreamEvent) -> Option<StreamOutput> {
        match event {
            ChatStreamEvent::Chunk(chunk) => {
                if chunk.content.is_empty() {
                    return None;
                }
                self.text.push_str(&chunk.content);
                Some(StreamOutput::TextDelta(chunk.content))
            }
            ChatStreamEvent::ToolCallChunk(tool_chunk) => {
                let call = tool_chunk.tool_call;
                let partial = self.entry(&call.call_id);

                // With tool-call capture enabled each chunk carries the
                // accumulated argument text, so replace rather than append.
                let args = raw_arguments(&call.fn_arguments);
                if !args.is_empty() {
                    partial.arguments = args;
                }

                if !call.fn_name.is_empty() && partial.name.is_empty() {
                    partial.name = call.fn_name;
                    return Some(StreamOutput::ToolCallStart {
                        id: partial.id.clone(),
                        name: partial.name.clone(),
                    });
                }
                None
            }
            ChatStreamEvent::End(end) => {
                // Captured tool calls are the source of truth.
                if let Some(tool_calls) = end.captured_tool_calls() {
                    for tc in tool_calls {
                        let end_args = raw_arguments(&tc.fn_arguments);
                        let partial = self.entry(&tc.call_id);
                        if partial.name.is_empty() {
                            partial.name = tc.fn_name.clone();
                        }
                        if !end_args.is_empty() {
                            partial.arguments = end_args;
                        }
                    }
                }
                self.usage = end.captured_usage;
                None
            }
            _ => None,
        }
    }

    /// Finish collecting and return the final result.
    ///
    /// Calls without a name are dropped; unparsable arguments become `null`
    /// and are rejected later by schema validation.
    pub fn finish(self) -> StreamResult {
        let mut remaining = self.tool_calls;
        let mut tool_calls = Vec::with_capacity(self.tool_call_order.len());

        for call_id in self.tool_call_order {
            let Some(p) = remaining.remove(&call_id) else {
                continue;
            };
            if p.name.is_empty() {
                continue;
            }
            let arguments = if p.arguments.trim().is_empty() {
                Value::Object(Default::default())
            } else {
                serde_json::from_str(&p.arguments).unwrap_or(Value::Null)
            };
            tool_calls.push(ToolCall::new(p.id, p.name, arguments));
        }

        StreamResult {
            text: self.text,
            tool_calls,
            usage: self.usage,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

//! Folding a UI event sequence back into an assistant [`Message`].

use crate::events::UIStreamEvent;
use weft_contract::{Message, Part, ToolInvocationState};

/// Error text for tool calls the stream never resolved.
pub const UNRESOLVED_TOOL_ERROR: &str = "stream ended before the tool call completed";

/// Incremental message builder.
///
/// Events are applied in arrival order. Repeated events for one tool call
/// update its part in place, so the final message has one entry per call
/// (and per data kind) no matter how many updates were streamed.
#[derive(Debug, Clone)]
pub struct MessageReassembler {
    message: Message,
    error: Option<String>,
    finish_reason: Option<String>,
    terminated: bool,
}

impl Default for MessageReassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageReassembler {
    pub fn new() -> Self {
        Self {
            message: Message::assistant(),
            error: None,
            finish_reason: None,
            terminated: false,
        }
    }

    pub fn apply(&mut self, event: &UIStreamEvent) {
        match event {
            UIStreamEvent::MessageStart { message_id } => {
                self.message.id = message_id.clone();
            }
            UIStreamEvent::StartStep | UIStreamEvent::FinishStep => {}
            UIStreamEvent::TextDelta { text } => {
                if let Some(Part::Text { text: open }) = self.message.parts.last_mut() {
                    open.push_str(text);
                } else {
                    self.message.parts.push(Part::text(text.clone()));
                }
            }
            UIStreamEvent::ToolInvocation {
                tool_name,
                call_id,
                status,
                input,
                result,
                error_text,
            } => self.apply_tool_invocation(tool_name, call_id, *status, input, result, error_text),
            UIStreamEvent::Data {
                data_type,
                call_id,
                data,
            } => {
                let existing = call_id.as_ref().and_then(|id| {
                    self.message.parts.iter_mut().find(|part| {
                        matches!(part, Part::Data { data_type: t, id: Some(pid), .. }
                            if t == data_type && pid == id)
                    })
                });
                match existing {
                    Some(Part::Data { data: current, .. }) => *current = data.clone(),
                    _ => self.message.parts.push(Part::Data {
                        data_type: data_type.clone(),
                        id: call_id.clone(),
                        data: data.clone(),
                    }),
                }
            }
            UIStreamEvent::Finish { reason } => {
                self.terminated = true;
                self.finish_reason = reason.clone();
            }
            UIStreamEvent::Abort { reason } => {
                self.terminated = true;
                self.finish_reason = reason.clone().or_else(|| Some("abort".to_string()));
            }
            UIStreamEvent::Error { message } => {
                self.terminated = true;
                self.error = Some(message.clone());
            }
        }
    }

    fn apply_tool_invocation(
        &mut self,
        tool_name: &str,
        call_id: &str,
        status: ToolInvocationState,
        input: &Option<serde_json::Value>,
        result: &Option<serde_json::Value>,
        error_text: &Option<String>,
    ) {
        let existing = self.message.parts.iter_mut().find(
            |part| matches!(part, Part::ToolInvocation { tool_call_id, .. } if tool_call_id == call_id),
        );
        match existing {
            Some(Part::ToolInvocation {
                state,
                input: current_input,
                output,
                error_text: current_error,
                ..
            }) => {
                *state = status;
                if input.is_some() {
                    current_input.clone_from(input);
                }
                if result.is_some() {
                    output.clone_from(result);
                }
                if error_text.is_some() {
                    current_error.clone_from(error_text);
                }
            }
            _ => self.message.parts.push(Part::ToolInvocation {
                tool_call_id: call_id.to_string(),
                tool_name: tool_name.to_string(),
                state: status,
                input: input.clone(),
                output: result.clone(),
                error_text: error_text.clone(),
            }),
        }
    }

    /// The message as reassembled so far.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Message of the terminal `error` event, if one arrived.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.finish_reason.as_deref()
    }

    /// Whether a terminal event was applied.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Return the message, marking every unresolved tool call as failed.
    pub fn finish(mut self) -> Message {
        for part in &mut self.message.parts {
            if let Part::ToolInvocation {
                state, error_text, ..
            } = part
            {
                if !state.is_terminal() {
                    *state = ToolInvocationState::Error;
                    if error_text.is_none() {
                        *error_text = Some(
                            self.error
                                .clone()
                                .unwrap_or_else(|| UNRESOLVED_TOOL_ERROR.to_string()),
                        );
                    }
                }
            }
        }
        self.message
    }
}

/// Fold a complete event sequence into a message.
pub fn reassemble<'a>(events: impl IntoIterator<Item = &'a UIStreamEvent>) -> Message {
    let mut reassembler = MessageReassembler::new();
    for event in events {
        reassembler.apply(event);
    }
    reassembler.finish()
}

//! Conversation data model shared by the loop, the wire protocol, and storage.
//!
//! A [`Conversation`] owns an ordered list of [`Message`]s; each message owns an
//! ordered list of [`Part`]s. Parts of type `tool-invocation` and `data-<kind>`
//! carry the tool call id as their correlation id so repeated emissions for one
//! call collapse into one evolving entry.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix of every tool-declared data part type.
pub const DATA_PART_PREFIX: &str = "data-";

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    User,
    Assistant,
    ToolSystem,
}

/// Lifecycle of one tool invocation as seen by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolInvocationState {
    /// The model requested the call; arguments may still be streaming.
    Pending,
    /// Arguments are complete and the tool is executing.
    Running,
    /// The tool returned a result.
    Done,
    /// The call failed (validation, execution, or interrupted stream).
    Error,
}

impl ToolInvocationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// One typed fragment of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Part {
    /// Text fragment; concatenation of adjacent fragments is the display value.
    Text { text: String },

    /// Tool call marker with its current status and eventual result.
    ToolInvocation {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
        state: ToolInvocationState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<Value>,
        #[serde(rename = "errorText", default, skip_serializing_if = "Option::is_none")]
        error_text: Option<String>,
    },

    /// Tool-declared payload (`data-<kind>`).
    #[serde(untagged)]
    Data {
        #[serde(rename = "type")]
        data_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        data: Value,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn tool_invocation(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        state: ToolInvocationState,
    ) -> Self {
        Self::ToolInvocation {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            state,
            input: None,
            output: None,
            error_text: None,
        }
    }

    /// Build a `data-<kind>` part tagged with a correlation id.
    pub fn data(kind: &str, id: Option<String>, data: Value) -> Self {
        Self::Data {
            data_type: format!("{DATA_PART_PREFIX}{kind}"),
            id,
            data,
        }
    }

    /// Tool call id this part belongs to, if any.
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            Self::Text { .. } => None,
            Self::ToolInvocation { tool_call_id, .. } => Some(tool_call_id),
            Self::Data { id, .. } => id.as_deref(),
        }
    }

    /// Kind of a data part without the `data-` prefix.
    pub fn data_kind(&self) -> Option<&str> {
        match self {
            Self::Data { data_type, .. } => data_type.strip_prefix(DATA_PART_PREFIX),
            _ => None,
        }
    }
}

/// A single conversation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Message {
    pub fn new(role: Role) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            role,
            parts: Vec::new(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User).with_part(Part::text(text))
    }

    pub fn assistant() -> Self {
        Self::new(Role::Assistant)
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn with_part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Tool invocation parts in message order.
    pub fn tool_invocations(&self) -> impl Iterator<Item = &Part> {
        self.parts
            .iter()
            .filter(|p| matches!(p, Part::ToolInvocation { .. }))
    }
}

/// Persisted conversation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&Role::ToolSystem).unwrap(),
            "\"tool-system\""
        );
        assert_eq!(
            serde_json::from_str::<Role>("\"assistant\"").unwrap(),
            Role::Assistant
        );
    }

    #[test]
    fn tool_invocation_part_wire_shape() {
        let part = Part::ToolInvocation {
            tool_call_id: "call_1".into(),
            tool_name: "getWeather".into(),
            state: ToolInvocationState::Done,
            input: Some(json!({"city": "Paris"})),
            output: Some(json!({"temperature": 21.5})),
            error_text: None,
        };
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value["type"], "tool-invocation");
        assert_eq!(value["toolCallId"], "call_1");
        assert_eq!(value["state"], "done");
        assert!(value.get("errorText").is_none());
    }

    #[test]
    fn data_part_deserializes_through_untagged_variant() {
        let raw = json!({
            "type": "data-weather",
            "id": "call_1",
            "data": {"loading": true}
        });
        let part: Part = serde_json::from_value(raw).unwrap();
        assert_eq!(part.data_kind(), Some("weather"));
        assert_eq!(part.correlation_id(), Some("call_1"));
    }

    #[test]
    fn message_text_joins_text_parts_only() {
        let msg = Message::assistant()
            .with_part(Part::text("Hel"))
            .with_part(Part::tool_invocation(
                "c1",
                "echo",
                ToolInvocationState::Running,
            ))
            .with_part(Part::text("lo"));
        assert_eq!(msg.text(), "Hello");
        assert_eq!(msg.tool_invocations().count(), 1);
    }

    #[test]
    fn conversation_roundtrips_through_json() {
        let conv = Conversation::new("chat-1")
            .with_message(Message::user("hi").with_id("m1"))
            .with_message(
                Message::assistant()
                    .with_id("m2")
                    .with_part(Part::data("weather", Some("c1".into()), json!({"city": "Oslo"}))),
            );
        let raw = serde_json::to_string(&conv).unwrap();
        let back: Conversation = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, conv);
    }
}

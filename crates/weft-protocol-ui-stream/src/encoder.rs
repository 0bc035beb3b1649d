use super::UIStreamEvent;
use weft_contract::{AgentEvent, TerminationReason, ToolInvocationState};

/// Error text attached to tool calls still open when the run ends.
pub const INTERRUPTED_TOOL_ERROR: &str = "tool call did not complete";

/// Stateful encoder from agent events to UI stream events.
///
/// Tracks open tool calls so that no `tool-invocation` is left pending or
/// running once a terminal event has been emitted.
///
/// # Rules
///
/// - `ToolCallStart` → `tool-invocation` pending
/// - `ToolCallReady` → `tool-invocation` running with input
/// - `ToolCallData` → `data-<kind>` tagged with the call id
/// - `ToolCallDone` → `tool-invocation` done or error
/// - `RunFinish` → open calls errored, then `finish` (or `abort` when cancelled)
/// - `Error` → open calls errored, then `error`
#[derive(Debug, Default)]
pub struct UiStreamEncoder {
    /// (call id, tool name) of calls not yet done, in start order.
    open_calls: Vec<(String, String)>,
    finished: bool,
}

impl UiStreamEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a terminal event has been produced.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn tool_name(&self, id: &str) -> Option<&str> {
        self.open_calls
            .iter()
            .find(|(call_id, _)| call_id == id)
            .map(|(_, name)| name.as_str())
    }

    fn close_open_calls(&mut self) -> Vec<UIStreamEvent> {
        self.open_calls
            .drain(..)
            .map(|(id, name)| UIStreamEvent::tool_error(id, name, INTERRUPTED_TOOL_ERROR))
            .collect()
    }

    /// Convert one agent event to zero or more UI stream events.
    pub fn on_agent_event(&mut self, ev: &AgentEvent) -> Vec<UIStreamEvent> {
        if self.finished {
            return Vec::new();
        }

        match ev {
            AgentEvent::RunStart { message_id, .. } => {
                vec![UIStreamEvent::message_start(message_id)]
            }
            AgentEvent::StepStart { .. } => vec![UIStreamEvent::start_step()],
            AgentEvent::StepEnd => vec![UIStreamEvent::finish_step()],
            AgentEvent::TextDelta { delta } => vec![UIStreamEvent::text_delta(delta)],

            AgentEvent::ToolCallStart { id, name } => {
                if self.tool_name(id).is_none() {
                    self.open_calls.push((id.clone(), name.clone()));
                }
                vec![UIStreamEvent::tool_invocation(
                    id,
                    name,
                    ToolInvocationState::Pending,
                )]
            }
            AgentEvent::ToolCallReady {
                id,
                name,
                arguments,
            } => {
                if self.tool_name(id).is_none() {
                    self.open_calls.push((id.clone(), name.clone()));
                }
                vec![UIStreamEvent::tool_running(id, name, arguments.clone())]
            }
            AgentEvent::ToolCallData { id, kind, data } => {
                vec![UIStreamEvent::data(kind, id, data.clone())]
            }
            AgentEvent::ToolCallDone { id, result } => {
                let name = self
                    .tool_name(id)
                    .map(str::to_string)
                    .unwrap_or_else(|| result.tool_name.clone());
                self.open_calls.retain(|(call_id, _)| call_id != id);
                match result.error_text() {
                    Some(error_text) => vec![UIStreamEvent::tool_error(id, name, error_text)],
                    None => vec![UIStreamEvent::tool_done(id, name, result.data.clone())],
                }
            }

            AgentEvent::RunFinish { termination, .. } => {
                self.finished = true;
                let mut events = self.close_open_calls();
                if matches!(termination, TerminationReason::Cancelled) {
                    events.push(UIStreamEvent::abort("cancelled"));
                } else {
                    events.push(UIStreamEvent::finish_with_reason(Self::map_termination(
                        termination,
                    )));
                }
                events
            }
            AgentEvent::Error { message } => {
                self.finished = true;
                let mut events = self.close_open_calls();
                events.push(UIStreamEvent::error(message));
                events
            }
        }
    }

    fn map_termination(reason: &TerminationReason) -> &'static str {
        match reason {
            TerminationReason::NaturalEnd => "stop",
            TerminationReason::Cancelled => "other",
            TerminationReason::Error => "error",
            TerminationReason::Stopped(stopped) => match stopped.code.as_str() {
                "max_rounds_reached" | "timeout_reached" => "length",
                "tool_called" => "tool-calls",
                "content_matched" => "stop",
                "consecutive_errors_exceeded" => "error",
                _ => "other",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use weft_contract::{StoppedReason, ToolResult};

    fn run_finish(termination: TerminationReason) -> AgentEvent {
        AgentEvent::RunFinish {
            run_id: "r".into(),
            result: None,
            termination,
        }
    }

    #[test]
    fn run_start_emits_message_start() {
        let mut enc = UiStreamEncoder::new();
        let events = enc.on_agent_event(&AgentEvent::RunStart {
            run_id: "r".into(),
            message_id: "m1".into(),
        });
        assert_eq!(events, vec![UIStreamEvent::message_start("m1")]);
    }

    #[test]
    fn tool_lifecycle_pending_running_done() {
        let mut enc = UiStreamEncoder::new();
        let start = enc.on_agent_event(&AgentEvent::ToolCallStart {
            id: "c1".into(),
            name: "getWeather".into(),
        });
        assert_eq!(
            start,
            vec![UIStreamEvent::tool_invocation(
                "c1",
                "getWeather",
                ToolInvocationState::Pending
            )]
        );
        let ready = enc.on_agent_event(&AgentEvent::ToolCallReady {
            id: "c1".into(),
            name: "getWeather".into(),
            arguments: json!({"city": "Paris"}),
        });
        assert_eq!(
            ready,
            vec![UIStreamEvent::tool_running("c1", "getWeather", json!({"city": "Paris"}))]
        );
        let data = enc.on_agent_event(&AgentEvent::ToolCallData {
            id: "c1".into(),
            kind: "weather".into(),
            data: json!({"loading": true}),
        });
        assert_eq!(
            data,
            vec![UIStreamEvent::data("weather", "c1", json!({"loading": true}))]
        );
        let done = enc.on_agent_event(&AgentEvent::ToolCallDone {
            id: "c1".into(),
            result: ToolResult::success("getWeather", json!({"temperature": 21.5})),
        });
        assert_eq!(
            done,
            vec![UIStreamEvent::tool_done(
                "c1",
                "getWeather",
                json!({"temperature": 21.5})
            )]
        );

        let finish = enc.on_agent_event(&run_finish(TerminationReason::NaturalEnd));
        assert_eq!(finish, vec![UIStreamEvent::finish_with_reason("stop")]);
    }

    #[test]
    fn failed_call_maps_to_error_status() {
        let mut enc = UiStreamEncoder::new();
        let events = enc.on_agent_event(&AgentEvent::ToolCallDone {
            id: "c1".into(),
            result: ToolResult::error_with_code("createPR", "execution_failed", "boom"),
        });
        match &events[0] {
            UIStreamEvent::ToolInvocation {
                status, error_text, ..
            } => {
                assert_eq!(*status, ToolInvocationState::Error);
                assert!(error_text.as_deref().unwrap().contains("boom"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn terminal_closes_open_calls_first() {
        let mut enc = UiStreamEncoder::new();
        enc.on_agent_event(&AgentEvent::ToolCallReady {
            id: "c1".into(),
            name: "generateCode".into(),
            arguments: json!({}),
        });
        let events = enc.on_agent_event(&run_finish(TerminationReason::Cancelled));
        assert_eq!(
            events,
            vec![
                UIStreamEvent::tool_error("c1", "generateCode", INTERRUPTED_TOOL_ERROR),
                UIStreamEvent::abort("cancelled"),
            ]
        );
        assert!(enc.is_finished());
    }

    #[test]
    fn nothing_after_terminal() {
        let mut enc = UiStreamEncoder::new();
        let events = enc.on_agent_event(&AgentEvent::Error {
            message: "backend down".into(),
        });
        assert_eq!(events, vec![UIStreamEvent::error("backend down")]);
        assert!(enc
            .on_agent_event(&AgentEvent::TextDelta { delta: "x".into() })
            .is_empty());
    }

    #[test]
    fn stop_reason_maps_to_finish_reason() {
        let mut enc = UiStreamEncoder::new();
        let events = enc.on_agent_event(&run_finish(TerminationReason::Stopped(
            StoppedReason::with_detail("tool_called", "getWeather"),
        )));
        assert_eq!(events, vec![UIStreamEvent::finish_with_reason("tool-calls")]);
    }
}

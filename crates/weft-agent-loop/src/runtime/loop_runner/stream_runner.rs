use super::outcome::{run_finish_result, RunState};
use super::*;
use crate::engine::convert::{assistant_turn, build_request, to_chat_messages, tool_response};
use crate::engine::stop_conditions::{check_stop_policies, StopCheckContext};
use crate::engine::tool_execution::{execute_tools, ToolExecutionEnv};
use crate::runtime::streaming::{StreamCollector, StreamOutput};
use async_stream::stream;
use futures::StreamExt;
use std::collections::HashSet;
use tokio::sync::mpsc;

// Stream adapter layer:
// - drives provider I/O and tool execution
// - forwards tool emissions while tools run
// - emits the AgentEvent stream

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending::<()>().await,
    }
}

pub(super) fn run_stream(
    config: AgentConfig,
    registry: ToolRegistry,
    messages: Vec<Message>,
    cancellation_token: Option<CancellationToken>,
) -> AgentEventStream {
    Box::pin(stream! {
        let run_id = uuid::Uuid::now_v7().to_string();
        let message_id = uuid::Uuid::now_v7().to_string();
        let executor = config.llm_executor_for_run();
        let token = cancellation_token;
        let mut history: Vec<genai::chat::ChatMessage> =
            messages.iter().flat_map(to_chat_messages).collect();
        let mut run_state = RunState::new();

        tracing::debug!(
            run_id = %run_id,
            agent = %config.id,
            model = %config.model,
            executor = executor.name(),
            tools = registry.len(),
            "run started"
        );
        yield AgentEvent::RunStart {
            run_id: run_id.clone(),
            message_id,
        };

        macro_rules! finish_run {
            ($termination:expr, $text:expr) => {{
                let termination = $termination;
                let result = run_finish_result(&termination, $text);
                tracing::debug!(
                    run_id = %run_id,
                    ?termination,
                    steps = run_state.completed_steps,
                    tool_calls = run_state.tool_calls,
                    tool_errors = run_state.tool_errors,
                    "run finished"
                );
                yield AgentEvent::RunFinish {
                    run_id: run_id.clone(),
                    result,
                    termination,
                };
                return;
            }};
        }

        macro_rules! fail_run {
            ($error:expr) => {{
                let error: AgentLoopError = $error;
                tracing::warn!(run_id = %run_id, error = %error, "run failed");
                yield AgentEvent::Error {
                    message: error.to_string(),
                };
                return;
            }};
        }

        loop {
            if token.as_ref().is_some_and(CancellationToken::is_cancelled) {
                finish_run!(TerminationReason::Cancelled, "");
            }

            yield AgentEvent::StepStart {
                step: run_state.completed_steps,
            };

            let request = build_request(&config.system_prompt, &history, &registry);
            let started = tokio::select! {
                _ = cancelled(token.as_ref()) => {
                    finish_run!(TerminationReason::Cancelled, "");
                }
                res = executor.exec_chat_stream_events(&config.model, request, config.chat_options.as_ref()) => res,
            };
            let mut chat_stream = match started {
                Ok(stream) => stream,
                Err(e) => {
                    fail_run!(AgentLoopError::LlmError(e.to_string()));
                }
            };

            let mut collector = StreamCollector::new();
            let mut announced: HashSet<String> = HashSet::new();
            loop {
                let next = tokio::select! {
                    _ = cancelled(token.as_ref()) => {
                        finish_run!(TerminationReason::Cancelled, "");
                    }
                    ev = chat_stream.next() => ev,
                };
                let Some(event) = next else {
                    break;
                };
                match event {
                    Ok(event) => match collector.process(event) {
                        Some(StreamOutput::TextDelta(delta)) => {
                            yield AgentEvent::TextDelta { delta };
                        }
                        Some(StreamOutput::ToolCallStart { id, name }) => {
                            announced.insert(id.clone());
                            yield AgentEvent::ToolCallStart { id, name };
                        }
                        None => {}
                    },
                    Err(e) => {
                        fail_run!(AgentLoopError::LlmError(e.to_string()));
                    }
                }
            }

            let result = collector.finish();
            if !result.needs_tools() {
                history.push(assistant_turn(&result.text, &[]));
                run_state.completed_steps += 1;
                yield AgentEvent::StepEnd;
                finish_run!(TerminationReason::NaturalEnd, &result.text);
            }

            history.push(assistant_turn(&result.text, &result.tool_calls));
            for call in &result.tool_calls {
                // Calls that only surfaced in the final event were never announced.
                if !announced.contains(&call.id) {
                    yield AgentEvent::ToolCallStart {
                        id: call.id.clone(),
                        name: call.name.clone(),
                    };
                }
                yield AgentEvent::ToolCallReady {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                };
            }

            let (emission_tx, mut emission_rx) = mpsc::unbounded_channel();
            let env = ToolExecutionEnv {
                sink: Some(emission_tx),
                cancellation_token: token.clone(),
            };
            let executions = {
                let tool_future = execute_tools(
                    config.tool_execution_mode,
                    &registry,
                    &result.tool_calls,
                    &env,
                );
                tokio::pin!(tool_future);
                loop {
                    tokio::select! {
                        _ = cancelled(token.as_ref()) => {
                            finish_run!(TerminationReason::Cancelled, "");
                        }
                        Some(emission) = emission_rx.recv() => {
                            yield AgentEvent::ToolCallData {
                                id: emission.call_id,
                                kind: emission.kind,
                                data: emission.data,
                            };
                        }
                        res = &mut tool_future => {
                            break res;
                        }
                    }
                }
            };
            while let Ok(emission) = emission_rx.try_recv() {
                yield AgentEvent::ToolCallData {
                    id: emission.call_id,
                    kind: emission.kind,
                    data: emission.data,
                };
            }

            let mut fatal = None;
            for exec in &executions {
                history.push(tool_response(&exec.call.id, &exec.result));
                if config.tool_errors_fatal && fatal.is_none() && exec.result.is_error() {
                    fatal = Some(AgentLoopError::ToolFailed {
                        call_id: exec.call.id.clone(),
                        tool: exec.call.name.clone(),
                        message: exec.result.error_text().unwrap_or_default().to_string(),
                    });
                }
                yield AgentEvent::ToolCallDone {
                    id: exec.call.id.clone(),
                    result: exec.result.clone(),
                };
            }
            if let Some(error) = fatal {
                fail_run!(error);
            }

            run_state.record_tool_step(&executions);
            yield AgentEvent::StepEnd;

            let stop_ctx = StopCheckContext {
                rounds: run_state.completed_steps,
                consecutive_errors: run_state.consecutive_errors,
                elapsed: run_state.elapsed(),
                last_tool_calls: &result.tool_calls,
                last_text: &result.text,
            };
            if let Some(reason) = check_stop_policies(&config.stop_conditions, &stop_ctx) {
                finish_run!(TerminationReason::Stopped(reason.into_stopped()), "");
            }
        }
    })
}

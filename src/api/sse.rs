//! Run 事件流适配：async-openai 的 AssistantStreamEvent → RunEvent
//!
//! SSE 分帧与事件反序列化由 async-openai 完成。RunEventAdapter 记住当前消息的文本块序号与
//! 当前运行步骤的工具调用序号，新文本块 / 新工具调用出现时先发出 TextCreated / ToolCallCreated。
//! 类型化反序列化失败的 Run 对象（如 tools 里带 v1 的 retrieval）按 JSON 兜底读取状态；
//! 其余无法识别的事件忽略。
#![allow(deprecated)]

use std::collections::HashSet;

use async_openai::error::{OpenAIError, StreamError};
use async_openai::types::assistants::{
    AssistantEventStream, AssistantStreamEvent, DeltaStepDetails, MessageDeltaContent,
    MessageDeltaContentTextAnnotations, MessageDeltaObject, RunObject, RunStepDeltaObject,
    RunStepDeltaStepDetailsToolCalls,
};
use futures_util::{stream, StreamExt};
use serde_json::Value;

use crate::api::client::map_openai_error;
use crate::api::traits::EventFeed;
use crate::core::AppError;
use crate::stream::events::{Annotation, RunEvent, ToolCall, ToolCallKind};

/// 把 async-openai 的事件流包装成会话消费的 EventFeed
pub fn run_event_feed(events: AssistantEventStream) -> EventFeed {
    let feed = events
        .scan(RunEventAdapter::default(), |adapter, item| {
            futures_util::future::ready(Some(stream::iter(adapter.adapt(item))))
        })
        .flatten();
    Box::pin(feed)
}

/// 单个 Run 事件流内的有状态映射
#[derive(Debug, Default)]
pub struct RunEventAdapter {
    message_id: Option<String>,
    text_blocks: HashSet<u32>,
    step_id: Option<String>,
    tool_indices: HashSet<u32>,
}

impl RunEventAdapter {
    pub fn adapt(
        &mut self,
        item: Result<AssistantStreamEvent, OpenAIError>,
    ) -> Vec<Result<RunEvent, AppError>> {
        match item {
            Ok(event) => self.event(event).into_iter().map(Ok).collect(),
            Err(OpenAIError::JSONDeserialize(e, raw)) => match run_from_json(&raw) {
                Some(event) => vec![Ok(event)],
                None => {
                    tracing::debug!("Skipping undecodable stream payload: {}", e);
                    Vec::new()
                }
            },
            Err(OpenAIError::StreamError(e)) => match *e {
                StreamError::UnknownEvent(event) => {
                    tracing::debug!("Ignoring stream event {}", event.event);
                    Vec::new()
                }
                other => vec![Err(AppError::StreamProtocol(format!(
                    "event stream interrupted: {other}"
                )))],
            },
            Err(OpenAIError::Reqwest(e)) => vec![Err(AppError::StreamProtocol(format!(
                "event stream interrupted: {e}"
            )))],
            Err(other) => vec![Err(AppError::during_run(map_openai_error(other)))],
        }
    }

    fn event(&mut self, event: AssistantStreamEvent) -> Vec<RunEvent> {
        match event {
            AssistantStreamEvent::ThreadMessageCreated(_) => {
                self.message_id = None;
                self.text_blocks.clear();
                Vec::new()
            }
            AssistantStreamEvent::ThreadMessageDelta(delta) => self.message_delta(delta),
            AssistantStreamEvent::ThreadRunStepDelta(delta) => self.step_delta(delta),
            AssistantStreamEvent::ThreadRunRequiresAction(run) => vec![requires_action(run)],
            AssistantStreamEvent::ThreadRunCompleted(_) => vec![RunEvent::RunCompleted],
            AssistantStreamEvent::ThreadRunFailed(run) => vec![run_failed("failed", run)],
            AssistantStreamEvent::ThreadRunCancelled(run) => vec![run_failed("cancelled", run)],
            AssistantStreamEvent::ThreadRunExpired(run) => vec![run_failed("expired", run)],
            AssistantStreamEvent::ThreadRunIncomplete(run) => vec![run_failed("incomplete", run)],
            AssistantStreamEvent::ErrorEvent(e) => vec![RunEvent::RunFailed {
                status: "error".to_string(),
                message: e.message,
            }],
            _ => Vec::new(),
        }
    }

    fn message_delta(&mut self, payload: MessageDeltaObject) -> Vec<RunEvent> {
        if self.message_id.as_deref() != Some(payload.id.as_str()) {
            self.message_id = Some(payload.id);
            self.text_blocks.clear();
        }
        let mut events = Vec::new();
        for part in payload.delta.content.unwrap_or_default() {
            match part {
                MessageDeltaContent::Text(block) => {
                    if self.text_blocks.insert(block.index) {
                        events.push(RunEvent::TextCreated);
                    }
                    let (value, annotations) = match block.text {
                        Some(text) => (
                            text.value,
                            text.annotations
                                .unwrap_or_default()
                                .into_iter()
                                .filter_map(annotation)
                                .collect(),
                        ),
                        None => (None, Vec::new()),
                    };
                    events.push(RunEvent::TextDelta { value, annotations });
                }
                MessageDeltaContent::ImageFile(image) => {
                    if let Some(image) = image.image_file {
                        events.push(RunEvent::ImageFileDone {
                            file_id: image.file_id,
                        });
                    }
                }
                _ => {}
            }
        }
        events
    }

    fn step_delta(&mut self, payload: RunStepDeltaObject) -> Vec<RunEvent> {
        if self.step_id.as_deref() != Some(payload.id.as_str()) {
            self.step_id = Some(payload.id);
            self.tool_indices.clear();
        }
        let DeltaStepDetails::ToolCalls(details) = payload.delta.step_details else {
            return Vec::new();
        };
        let mut events = Vec::new();
        for call in details.tool_calls.unwrap_or_default() {
            let (index, kind, input) = match call {
                RunStepDeltaStepDetailsToolCalls::CodeInterpreter(c) => (
                    c.index,
                    ToolCallKind::CodeInterpreter,
                    c.code_interpreter.and_then(|ci| ci.input),
                ),
                RunStepDeltaStepDetailsToolCalls::FileSearch(c) => {
                    (c.index, ToolCallKind::FileSearch, None)
                }
                RunStepDeltaStepDetailsToolCalls::Function(c) => (
                    c.index,
                    ToolCallKind::Function,
                    c.function.and_then(|f| f.arguments),
                ),
            };
            if self.tool_indices.insert(index) {
                events.push(RunEvent::ToolCallCreated { kind });
            }
            events.push(RunEvent::ToolCallDelta { kind, input });
        }
        events
    }
}

fn annotation(a: MessageDeltaContentTextAnnotations) -> Option<Annotation> {
    match a {
        MessageDeltaContentTextAnnotations::FilePath(p) => Some(Annotation::FilePath {
            text: p.text?,
            file_id: p.file_path?.file_id,
        }),
        MessageDeltaContentTextAnnotations::FileCitation(c) => Some(Annotation::FileCitation {
            text: c.text?,
            file_id: c.file_citation?.file_id,
        }),
    }
}

fn requires_action(run: RunObject) -> RunEvent {
    let tool_calls = run
        .required_action
        .map(|a| a.submit_tool_outputs.tool_calls)
        .unwrap_or_default()
        .into_iter()
        .map(|c| ToolCall {
            id: c.id,
            kind: ToolCallKind::parse(&c.r#type).unwrap_or(ToolCallKind::Function),
            name: c.function.name,
            input: c.function.arguments,
        })
        .collect();
    RunEvent::RequiresAction {
        run_id: run.id,
        tool_calls,
    }
}

fn run_failed(status: &str, run: RunObject) -> RunEvent {
    RunEvent::RunFailed {
        status: status.to_string(),
        message: run
            .last_error
            .map(|e| e.message)
            .unwrap_or_else(|| "run did not complete".to_string()),
    }
}

/// 兜底：按 JSON 读取 thread.run 对象的状态
fn run_from_json(raw: &str) -> Option<RunEvent> {
    let run: Value = serde_json::from_str(raw).ok()?;
    if run.get("object").and_then(Value::as_str) != Some("thread.run") {
        return None;
    }
    let text = |v: &Value| v.as_str().unwrap_or_default().to_string();
    let status = run.get("status").and_then(Value::as_str)?;
    match status {
        "completed" => Some(RunEvent::RunCompleted),
        "requires_action" => {
            let calls = run
                .pointer("/required_action/submit_tool_outputs/tool_calls")
                .and_then(Value::as_array)?;
            let tool_calls = calls
                .iter()
                .map(|c| ToolCall {
                    id: text(&c["id"]),
                    kind: c["type"]
                        .as_str()
                        .and_then(ToolCallKind::parse)
                        .unwrap_or(ToolCallKind::Function),
                    name: text(&c["function"]["name"]),
                    input: text(&c["function"]["arguments"]),
                })
                .collect();
            Some(RunEvent::RequiresAction {
                run_id: text(&run["id"]),
                tool_calls,
            })
        }
        "failed" | "cancelled" | "expired" | "incomplete" => Some(RunEvent::RunFailed {
            status: status.to_string(),
            message: run
                .pointer("/last_error/message")
                .and_then(Value::as_str)
                .unwrap_or("run did not complete")
                .to_string(),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ApiError;
    use serde_json::json;

    fn event(name: &str, data: Value) -> Result<AssistantStreamEvent, OpenAIError> {
        Ok(serde_json::from_value(json!({ "event": name, "data": data })).unwrap())
    }

    fn run(status: &str, extra: Value) -> Value {
        let mut run = json!({
            "id": "run_1",
            "object": "thread.run",
            "created_at": 1700000000,
            "thread_id": "thread_1",
            "assistant_id": "asst_1",
            "status": status,
            "model": "gpt-4",
            "instructions": "help",
            "tools": [],
            "parallel_tool_calls": true
        });
        if let (Some(run), Some(extra)) = (run.as_object_mut(), extra.as_object()) {
            run.extend(extra.clone());
        }
        run
    }

    fn adapt_all(items: Vec<Result<AssistantStreamEvent, OpenAIError>>) -> Vec<RunEvent> {
        let mut adapter = RunEventAdapter::default();
        items
            .into_iter()
            .flat_map(|item| adapter.adapt(item))
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    fn text_delta(id: &str, index: u32, value: &str) -> Result<AssistantStreamEvent, OpenAIError> {
        event(
            "thread.message.delta",
            json!({
                "id": id,
                "object": "thread.message.delta",
                "delta": {"content": [{"index": index, "type": "text", "text": {"value": value}}]}
            }),
        )
    }

    #[test]
    fn test_text_blocks_emit_created_once() {
        let events = adapt_all(vec![
            text_delta("msg_1", 0, "Hel"),
            text_delta("msg_1", 0, "lo"),
            text_delta("msg_1", 1, "!"),
            text_delta("msg_2", 0, "otra"),
            event("thread.run.completed", run("completed", json!({}))),
        ]);
        assert_eq!(
            events,
            vec![
                RunEvent::TextCreated,
                RunEvent::text("Hel"),
                RunEvent::text("lo"),
                RunEvent::TextCreated,
                RunEvent::text("!"),
                RunEvent::TextCreated,
                RunEvent::text("otra"),
                RunEvent::RunCompleted,
            ]
        );
    }

    #[test]
    fn test_annotations_and_images_mapped() {
        let events = adapt_all(vec![event(
            "thread.message.delta",
            json!({
                "id": "msg_1",
                "object": "thread.message.delta",
                "delta": {"content": [
                    {"index": 0, "type": "image_file", "image_file": {"file_id": "file-img"}},
                    {"index": 1, "type": "text", "text": {"annotations": [{
                        "index": 0,
                        "type": "file_path",
                        "text": "sandbox:/a.csv",
                        "start_index": 1,
                        "end_index": 2,
                        "file_path": {"file_id": "file-a"}
                    }]}}
                ]}
            }),
        )]);
        assert_eq!(
            events,
            vec![
                RunEvent::ImageFileDone {
                    file_id: "file-img".into()
                },
                RunEvent::TextCreated,
                RunEvent::TextDelta {
                    value: None,
                    annotations: vec![Annotation::FilePath {
                        text: "sandbox:/a.csv".into(),
                        file_id: "file-a".into()
                    }],
                },
            ]
        );
    }

    #[test]
    fn test_code_interpreter_step_delta() {
        let step = |input: &str| {
            event(
                "thread.run.step.delta",
                json!({
                    "id": "step_1",
                    "object": "thread.run.step.delta",
                    "delta": {"step_details": {"type": "tool_calls", "tool_calls": [
                        {"index": 0, "type": "code_interpreter", "code_interpreter": {"input": input}}
                    ]}}
                }),
            )
        };
        let events = adapt_all(vec![step(""), step("1+1")]);
        assert_eq!(
            events,
            vec![
                RunEvent::ToolCallCreated {
                    kind: ToolCallKind::CodeInterpreter
                },
                RunEvent::ToolCallDelta {
                    kind: ToolCallKind::CodeInterpreter,
                    input: Some(String::new())
                },
                RunEvent::ToolCallDelta {
                    kind: ToolCallKind::CodeInterpreter,
                    input: Some("1+1".into())
                },
            ]
        );
    }

    #[test]
    fn test_requires_action_mapped() {
        let events = adapt_all(vec![event(
            "thread.run.requires_action",
            run(
                "requires_action",
                json!({"required_action": {
                    "type": "submit_tool_outputs",
                    "submit_tool_outputs": {"tool_calls": [
                        {"id": "call_a", "type": "function", "function": {"name": "salary", "arguments": "{}"}},
                        {"id": "call_b", "type": "function", "function": {"name": "jobs", "arguments": "{\"q\":1}"}}
                    ]}
                }}),
            ),
        )]);
        match &events[..] {
            [RunEvent::RequiresAction { run_id, tool_calls }] => {
                assert_eq!(run_id, "run_1");
                assert_eq!(tool_calls.len(), 2);
                assert_eq!(tool_calls[0].id, "call_a");
                assert_eq!(tool_calls[1].name, "jobs");
                assert_eq!(tool_calls[1].input, "{\"q\":1}");
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn test_failed_run_and_error_event() {
        let events = adapt_all(vec![
            event(
                "thread.run.failed",
                run(
                    "failed",
                    json!({"last_error": {"code": "rate_limit_exceeded", "message": "slow down"}}),
                ),
            ),
            event("error", json!({"message": "boom"})),
        ]);
        assert_eq!(
            events,
            vec![
                RunEvent::RunFailed {
                    status: "failed".into(),
                    message: "slow down".into()
                },
                RunEvent::RunFailed {
                    status: "error".into(),
                    message: "boom".into()
                },
            ]
        );
    }

    #[test]
    fn test_v1_run_object_falls_back_to_json() {
        // v1 的 Run 带 retrieval 工具、没有 parallel_tool_calls，类型化反序列化失败
        let raw = json!({
            "id": "run_1",
            "object": "thread.run",
            "status": "requires_action",
            "tools": [{"type": "retrieval"}],
            "required_action": {"type": "submit_tool_outputs", "submit_tool_outputs": {
                "tool_calls": [{"id": "call_a", "type": "function", "function": {"name": "f", "arguments": "{}"}}]
            }}
        })
        .to_string();
        let decode_error = serde_json::from_str::<RunObject>(&raw).unwrap_err();
        let events = adapt_all(vec![
            Err(OpenAIError::JSONDeserialize(decode_error, raw)),
            Err(OpenAIError::JSONDeserialize(
                serde_json::from_str::<Value>("{").unwrap_err(),
                "{\"object\":\"thread.run.step\",\"step_details\":{\"type\":\"retrieval\"}}".into(),
            )),
        ]);
        match &events[..] {
            [RunEvent::RequiresAction { run_id, tool_calls }] => {
                assert_eq!(run_id, "run_1");
                assert_eq!(tool_calls[0].name, "f");
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn test_remote_rejection_mid_stream_is_run_error() {
        let mut adapter = RunEventAdapter::default();
        let out = adapter.adapt(Err(OpenAIError::ApiError(async_openai::error::ApiError {
            message: "Rate limit reached".into(),
            r#type: None,
            param: None,
            code: Some("rate_limit_exceeded".into()),
        })));
        assert!(matches!(
            out.as_slice(),
            [Err(AppError::RunRequest(ApiError::Rejected { .. }))]
        ));
    }

    #[test]
    fn test_lifecycle_noise_ignored() {
        let events = adapt_all(vec![
            event("thread.run.created", run("queued", json!({}))),
            event("thread.run.in_progress", run("in_progress", json!({}))),
            event("done", json!("[DONE]")),
        ]);
        assert!(events.is_empty());
    }
}

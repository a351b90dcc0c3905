//! 流式重建：把单个 Run 的有序事件还原为只追加的会话记录
//!
//! 状态机：Idle → Streaming → (AwaitingToolResolution → Streaming)* → Completed。
//! 进入 Streaming / AwaitingToolResolution 即禁用输入，直到 run-completed（或超时、失败时的 abort）。
//! apply 只处理一个事件并返回新状态与副作用，不做任何 IO，便于用合成事件序列测试。

use crate::core::{AppError, RunState};
use crate::memory::{Message, Role, TranscriptStore};
use crate::stream::events::{Annotation, RunEvent, ToolCall, ToolCallKind};

/// apply 产生的副作用，由会话层执行
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    None,
    /// 需要解析全部工具调用后按 run_id 批量提交
    ResolveTools {
        run_id: String,
        tool_calls: Vec<ToolCall>,
    },
    /// Run 正常结束
    Finished,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub state: RunState,
    pub effect: Effect,
}

pub struct StreamReconstructor {
    state: RunState,
    files_url_prefix: String,
}

impl StreamReconstructor {
    pub fn new(files_url_prefix: impl Into<String>) -> Self {
        Self {
            state: RunState::Idle,
            files_url_prefix: files_url_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn input_enabled(&self) -> bool {
        self.state.accepts_input()
    }

    /// 用户提交后、事件流打开前调用
    pub fn begin_run(&mut self) -> Result<(), AppError> {
        if !self.input_enabled() {
            return Err(AppError::Busy(format!("run in progress ({:?})", self.state)));
        }
        self.state = RunState::Streaming;
        Ok(())
    }

    /// 工具输出已提交，开始消费新的事件流
    pub fn resume_streaming(&mut self) {
        if self.state == RunState::AwaitingToolResolution {
            self.state = RunState::Streaming;
        }
    }

    /// 超时、协议错误、取消：强制回到 Idle 并恢复输入
    pub fn abort(&mut self) {
        if !self.input_enabled() {
            tracing::warn!("Run aborted in state {:?}, re-enabling input", self.state);
        }
        self.state = RunState::Idle;
    }

    fn file_url(&self, file_id: &str) -> String {
        format!("{}/{}", self.files_url_prefix, file_id)
    }

    pub fn apply(
        &mut self,
        event: RunEvent,
        transcript: &mut TranscriptStore,
    ) -> Result<Transition, AppError> {
        tracing::debug!(event = event.name(), state = ?self.state, "apply run event");
        let effect = match event {
            RunEvent::TextCreated => {
                transcript.push(Message::assistant(""));
                self.state = RunState::Streaming;
                Effect::None
            }
            RunEvent::TextDelta { value, annotations } => {
                self.state = RunState::Streaming;
                if let Some(fragment) = value.filter(|v| !v.is_empty()) {
                    expect_last(transcript, Role::Assistant, "text delta")?;
                    transcript.append_to_last(&fragment);
                }
                if !annotations.is_empty() {
                    expect_last(transcript, Role::Assistant, "annotation")?;
                    self.annotate_last(transcript, &annotations);
                }
                Effect::None
            }
            RunEvent::ImageFileDone { file_id } => {
                self.state = RunState::Streaming;
                let markup = format!("\n![{}]({})\n", file_id, self.file_url(&file_id));
                if !transcript.append_to_last(&markup) {
                    return Err(AppError::StreamProtocol(
                        "image received before any message".into(),
                    ));
                }
                Effect::None
            }
            RunEvent::ToolCallCreated { kind } => {
                self.state = RunState::Streaming;
                if kind == ToolCallKind::CodeInterpreter {
                    transcript.push(Message::code(""));
                }
                Effect::None
            }
            RunEvent::ToolCallDelta { kind, input } => {
                self.state = RunState::Streaming;
                if kind == ToolCallKind::CodeInterpreter {
                    if let Some(fragment) = input.filter(|v| !v.is_empty()) {
                        expect_last(transcript, Role::Code, "tool call delta")?;
                        transcript.append_to_last(&fragment);
                    }
                }
                Effect::None
            }
            RunEvent::RequiresAction { run_id, tool_calls } => {
                tracing::info!("Run {} requires {} tool output(s)", run_id, tool_calls.len());
                self.state = RunState::AwaitingToolResolution;
                Effect::ResolveTools { run_id, tool_calls }
            }
            RunEvent::RunCompleted => {
                self.state = RunState::Completed;
                Effect::Finished
            }
            RunEvent::RunFailed { status, message } => {
                self.state = RunState::Idle;
                return Err(AppError::RunFailed { status, message });
            }
        };
        Ok(Transition {
            state: self.state,
            effect,
        })
    }

    /// 对整条最后消息做替换（不只是最新片段），注解与文本的到达先后不影响最终结果
    fn annotate_last(&self, transcript: &mut TranscriptStore, annotations: &[Annotation]) {
        for annotation in annotations {
            if let Annotation::FilePath { text, file_id } = annotation {
                let replaced = transcript.replace_in_last(text, &self.file_url(file_id));
                tracing::debug!("Annotation {} -> {} ({} occurrence(s))", text, file_id, replaced);
            }
        }
    }
}

fn expect_last(transcript: &TranscriptStore, role: Role, what: &str) -> Result<(), AppError> {
    match transcript.last_role() {
        Some(r) if r == role => Ok(()),
        other => Err(AppError::StreamProtocol(format!(
            "{what} expects last message role {role:?}, found {other:?}"
        ))),
    }
}

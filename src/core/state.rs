//! 状态定义：RunState 与 UI 投影 UiState
//!
//! UI 只持有轻量的 UiState（阶段、历史、输入锁、错误、附件名）；完整状态由 SessionController 维护并投影。

use serde::Serialize;

use crate::memory::Message;

/// 单个 Run 的阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RunState {
    /// 没有进行中的 Run，可以输入
    Idle,
    /// 正在消费事件流，输入禁用
    Streaming,
    /// 等待工具输出提交，输入禁用
    AwaitingToolResolution,
    /// 收到 run-completed，可以输入
    Completed,
}

impl RunState {
    pub fn accepts_input(&self) -> bool {
        matches!(self, RunState::Idle | RunState::Completed)
    }
}

/// UI 看到的「投影」状态，轻量且易于渲染
#[derive(Clone, Debug, Serialize)]
pub struct UiState {
    pub phase: RunState,
    pub history: Vec<Message>,
    pub input_locked: bool,
    pub error_message: Option<String>,
    /// 附件文件名（处理中或待发送）
    pub attachment: Option<String>,
    pub processing_attachment: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            phase: RunState::Idle,
            history: Vec::new(),
            input_locked: false,
            error_message: None,
            attachment: None,
            processing_attachment: false,
        }
    }
}

//! Run 事件：远端事件流经解码后得到的封闭事件集合，由 StreamReconstructor 按到达顺序消费

use serde::{Deserialize, Serialize};

/// 工具调用种类
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallKind {
    CodeInterpreter,
    FileSearch,
    Retrieval,
    Function,
}

impl ToolCallKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "code_interpreter" => Some(Self::CodeInterpreter),
            "file_search" => Some(Self::FileSearch),
            "retrieval" => Some(Self::Retrieval),
            "function" => Some(Self::Function),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CodeInterpreter => "code_interpreter",
            Self::FileSearch => "file_search",
            Self::Retrieval => "retrieval",
            Self::Function => "function",
        }
    }
}

/// 需要调用方解析的工具调用（requires_action 中的一项）
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ToolCall {
    pub id: String,
    pub kind: ToolCallKind,
    /// 函数名；非函数调用为空
    pub name: String,
    /// 累积的输入（函数参数 JSON 文本）
    pub input: String,
}

/// 提交给远端的工具输出，按 tool_call_id 对应
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

/// 文本注解：把生成文本中的一段字面量改写为文件引用
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Annotation {
    /// 生成的文件（沙箱路径），改写为可下载的文件地址
    FilePath { text: String, file_id: String },
    /// 检索引用，保持原文
    FileCitation { text: String, file_id: String },
}

/// 单个 Run 的事件
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// 新的文本块开始
    TextCreated,
    TextDelta {
        value: Option<String>,
        annotations: Vec<Annotation>,
    },
    ImageFileDone { file_id: String },
    ToolCallCreated { kind: ToolCallKind },
    ToolCallDelta {
        kind: ToolCallKind,
        input: Option<String>,
    },
    RequiresAction {
        run_id: String,
        tool_calls: Vec<ToolCall>,
    },
    RunCompleted,
    /// failed / cancelled / expired / incomplete / error
    RunFailed { status: String, message: String },
}

impl RunEvent {
    pub fn text(value: impl Into<String>) -> Self {
        RunEvent::TextDelta {
            value: Some(value.into()),
            annotations: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RunEvent::TextCreated => "text_created",
            RunEvent::TextDelta { .. } => "text_delta",
            RunEvent::ImageFileDone { .. } => "image_file_done",
            RunEvent::ToolCallCreated { .. } => "tool_call_created",
            RunEvent::ToolCallDelta { .. } => "tool_call_delta",
            RunEvent::RequiresAction { .. } => "requires_action",
            RunEvent::RunCompleted => "run_completed",
            RunEvent::RunFailed { .. } => "run_failed",
        }
    }
}

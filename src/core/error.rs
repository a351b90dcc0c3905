//! 错误类型与恢复动作
//!
//! AppError 覆盖配置、远端资源、附件提取、事件流协议、工具解析五类错误；
//! recovery() 给出会话层的处理建议（重新上传 / 恢复输入 / 终止），由会话编排器执行。均不自动重试。
//! 启动阶段的远端失败是 RemoteResource；会话进行中的远端失败经 during_run() 归为 RunRequest 或 SessionGone。

use thiserror::Error;

/// 远端 API 调用错误（资源不存在、请求被拒、传输、解码）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// 服务端返回的错误体；code 取 error.code，缺省时取 error.type
    #[error("Request rejected: {message}")]
    Rejected {
        code: Option<String>,
        message: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

/// PDF 附件提取错误（类型不支持 / 解析失败 / 已有提取在进行）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Unsupported document type: {0}")]
    UnsupportedType(String),

    #[error("Failed to extract PDF content: {0}")]
    Parse(String),

    #[error("Another document is still being processed")]
    Busy,

    #[error("Document too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("IO error: {0}")]
    Io(String),
}

/// 会话与启动过程中的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("Config error: {0}")]
    Configuration(String),

    #[error("Remote resource error: {0}")]
    RemoteResource(#[from] ApiError),

    #[error("Assistant {id} is not usable: {reason}")]
    AssistantUnavailable { id: String, reason: String },

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Stream protocol error: {0}")]
    StreamProtocol(String),

    #[error("Tool resolution failed: {0}")]
    ToolResolution(String),

    #[error("Run {status}: {message}")]
    RunFailed { status: String, message: String },

    /// 会话中发消息 / 打开事件流 / 提交工具输出失败（限流、5xx、网络）
    #[error("Run request failed: {0}")]
    RunRequest(ApiError),

    /// 会话使用的线程或 Assistant 在远端已不存在
    #[error("Session resources are gone: {0}")]
    SessionGone(String),

    #[error("Cancelled")]
    Cancelled,

    /// 运行中或附件处理中再次提交
    #[error("Session busy: {0}")]
    Busy(String),

    /// 空输入、不存在的建议编号等，不触发任何远端调用
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// 会话层根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 丢弃附件，用户可重新上传；会话继续
    RetryUpload,
    /// 强制恢复输入并向用户展示错误
    ReenableInput,
    /// 会话无法继续：取消会话并退出
    Abort,
}

impl AppError {
    pub fn recovery(&self) -> RecoveryAction {
        match self {
            AppError::Extraction(_) => RecoveryAction::RetryUpload,
            AppError::StreamProtocol(_)
            | AppError::ToolResolution(_)
            | AppError::RunFailed { .. }
            | AppError::RunRequest(_)
            | AppError::Busy(_)
            | AppError::InvalidInput(_) => RecoveryAction::ReenableInput,
            AppError::Configuration(_)
            | AppError::RemoteResource(_)
            | AppError::AssistantUnavailable { .. }
            | AppError::SessionGone(_)
            | AppError::Cancelled => RecoveryAction::Abort,
        }
    }

    /// 会话进行中的远端失败：资源已不存在时终止会话，其余只恢复输入
    pub fn during_run(err: ApiError) -> Self {
        match err {
            ApiError::NotFound(reason) => AppError::SessionGone(reason),
            other => AppError::RunRequest(other),
        }
    }
}

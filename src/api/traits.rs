//! 远端资源抽象
//!
//! AssistantsApi：Assistant 的创建 / 读取 / 更新（供 Reconciler 使用）；
//! ThreadsApi：线程创建、发送消息并打开 Run 事件流、提交工具输出（供 SessionController 使用）。
//! 实现：HttpAssistantClient（async-openai）与 MockBackend（内存，测试 / 离线）。

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::api::types::AssistantObject;
use crate::assistant::AssistantDescriptor;
use crate::core::{ApiError, AppError};
use crate::stream::events::{RunEvent, ToolOutput};

/// 单个 Run 的有序事件流
pub type EventFeed = Pin<Box<dyn Stream<Item = Result<RunEvent, AppError>> + Send>>;

#[async_trait]
pub trait AssistantsApi: Send + Sync {
    async fn create_assistant(&self, desired: &AssistantDescriptor)
        -> Result<AssistantObject, ApiError>;

    /// 不存在时返回 ApiError::NotFound
    async fn retrieve_assistant(&self, id: &str) -> Result<AssistantObject, ApiError>;

    async fn update_assistant(
        &self,
        id: &str,
        desired: &AssistantDescriptor,
    ) -> Result<AssistantObject, ApiError>;
}

#[async_trait]
pub trait ThreadsApi: Send + Sync {
    async fn create_thread(&self) -> Result<String, ApiError>;

    /// 把用户消息写入线程并以流式方式启动 Run
    async fn post_message(
        &self,
        thread_id: &str,
        assistant_id: &str,
        content: &str,
    ) -> Result<EventFeed, ApiError>;

    /// 按 run_id 批量提交工具输出，返回续接的事件流
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<EventFeed, ApiError>;
}

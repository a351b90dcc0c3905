//! Mock 后端（用于测试，无需 API）
//!
//! 内存中保存 Assistant，按脚本返回 Run 事件流，并记录每类远端调用的次数与提交内容。
//! 没有脚本时回显用户消息并正常结束 Run。

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream;
use futures_util::StreamExt;

use crate::api::traits::{AssistantsApi, EventFeed, ThreadsApi};
use crate::api::types::AssistantObject;
use crate::assistant::AssistantDescriptor;
use crate::core::{ApiError, AppError};
use crate::stream::events::{RunEvent, ToolOutput};

/// 远端调用计数
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MockCalls {
    pub create_assistant: usize,
    pub retrieve_assistant: usize,
    pub update_assistant: usize,
    pub create_thread: usize,
    pub post_message: usize,
    pub submit_tool_outputs: usize,
}

/// 可注入失败的操作
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MockOp {
    CreateAssistant,
    RetrieveAssistant,
    UpdateAssistant,
    CreateThread,
    PostMessage,
    SubmitToolOutputs,
}

/// 一次 post_message / submit_tool_outputs 返回的事件流脚本
#[derive(Clone, Debug)]
pub enum MockFeed {
    /// 依次产出事件后关闭
    Events(Vec<RunEvent>),
    /// 产出事件后永远挂起（不关闭也不结束）
    EventsThenStall(Vec<RunEvent>),
}

#[derive(Default)]
struct MockState {
    assistants: HashMap<String, AssistantObject>,
    feeds: VecDeque<MockFeed>,
    failures: HashMap<MockOp, ApiError>,
    calls: MockCalls,
    messages: Vec<(String, String)>,
    submissions: Vec<(String, Vec<ToolOutput>)>,
}

#[derive(Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // 测试中某个断言 panic 后仍能继续读取计数
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 预置一个已存在的 Assistant
    pub fn insert_assistant(&self, id: &str, descriptor: &AssistantDescriptor) {
        self.lock()
            .assistants
            .insert(id.to_string(), to_object(id, descriptor));
    }

    pub fn assistant(&self, id: &str) -> Option<AssistantDescriptor> {
        self.lock().assistants.get(id).map(|a| a.descriptor())
    }

    pub fn push_feed(&self, feed: MockFeed) {
        self.lock().feeds.push_back(feed);
    }

    /// 下一次 op 调用返回 err
    pub fn fail_next(&self, op: MockOp, err: ApiError) {
        self.lock().failures.insert(op, err);
    }

    pub fn calls(&self) -> MockCalls {
        self.lock().calls
    }

    /// (thread_id, content)
    pub fn posted_messages(&self) -> Vec<(String, String)> {
        self.lock().messages.clone()
    }

    /// (run_id, outputs)
    pub fn tool_submissions(&self) -> Vec<(String, Vec<ToolOutput>)> {
        self.lock().submissions.clone()
    }

    fn take_failure(&self, op: MockOp) -> Result<(), ApiError> {
        match self.lock().failures.remove(&op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn next_feed(&self, echo: Option<&str>) -> EventFeed {
        let script = self.lock().feeds.pop_front();
        let script = script.unwrap_or_else(|| {
            MockFeed::Events(vec![
                RunEvent::TextCreated,
                RunEvent::text(format!("Echo from Mock: {}", echo.unwrap_or("(tool outputs)"))),
                RunEvent::RunCompleted,
            ])
        });
        match script {
            MockFeed::Events(events) => {
                Box::pin(stream::iter(events.into_iter().map(Ok::<RunEvent, AppError>)))
            }
            MockFeed::EventsThenStall(events) => Box::pin(
                stream::iter(events.into_iter().map(Ok::<RunEvent, AppError>))
                    .chain(stream::pending::<Result<RunEvent, AppError>>()),
            ),
        }
    }
}

fn to_object(id: &str, d: &AssistantDescriptor) -> AssistantObject {
    AssistantObject {
        id: id.to_string(),
        name: Some(d.name.clone()),
        instructions: Some(d.instructions.clone()),
        model: d.model.clone(),
        tools: d.tools.clone(),
    }
}

#[async_trait]
impl AssistantsApi for MockBackend {
    async fn create_assistant(
        &self,
        desired: &AssistantDescriptor,
    ) -> Result<AssistantObject, ApiError> {
        self.lock().calls.create_assistant += 1;
        self.take_failure(MockOp::CreateAssistant)?;
        let id = format!("asst_{}", uuid::Uuid::new_v4().simple());
        let obj = to_object(&id, desired);
        self.lock().assistants.insert(id, obj.clone());
        Ok(obj)
    }

    async fn retrieve_assistant(&self, id: &str) -> Result<AssistantObject, ApiError> {
        self.lock().calls.retrieve_assistant += 1;
        self.take_failure(MockOp::RetrieveAssistant)?;
        self.lock()
            .assistants
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("No assistant found with id '{id}'.")))
    }

    async fn update_assistant(
        &self,
        id: &str,
        desired: &AssistantDescriptor,
    ) -> Result<AssistantObject, ApiError> {
        self.lock().calls.update_assistant += 1;
        self.take_failure(MockOp::UpdateAssistant)?;
        let mut state = self.lock();
        if !state.assistants.contains_key(id) {
            return Err(ApiError::NotFound(format!("No assistant found with id '{id}'.")));
        }
        let obj = to_object(id, desired);
        state.assistants.insert(id.to_string(), obj.clone());
        Ok(obj)
    }
}

#[async_trait]
impl ThreadsApi for MockBackend {
    async fn create_thread(&self) -> Result<String, ApiError> {
        self.lock().calls.create_thread += 1;
        self.take_failure(MockOp::CreateThread)?;
        Ok(format!("thread_{}", uuid::Uuid::new_v4().simple()))
    }

    async fn post_message(
        &self,
        thread_id: &str,
        _assistant_id: &str,
        content: &str,
    ) -> Result<EventFeed, ApiError> {
        self.lock().calls.post_message += 1;
        self.take_failure(MockOp::PostMessage)?;
        self.lock()
            .messages
            .push((thread_id.to_string(), content.to_string()));
        Ok(self.next_feed(Some(content)))
    }

    async fn submit_tool_outputs(
        &self,
        _thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<EventFeed, ApiError> {
        self.lock().calls.submit_tool_outputs += 1;
        self.take_failure(MockOp::SubmitToolOutputs)?;
        self.lock()
            .submissions
            .push((run_id.to_string(), outputs.to_vec()));
        Ok(self.next_feed(None))
    }
}

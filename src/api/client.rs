//! 基于 async-openai 的 Assistants API 客户端
//!
//! AssistantsConfig 按提供方拼 URL 与鉴权头：azure 用 api-key 头并附加 api-version 查询参数，
//! 路径直接挂在 {endpoint}/openai 下（AzureConfig 会插入 deployments 段，Assistants 端点没有这一段）；
//! openai 用 Bearer 与 OpenAI-Beta: assistants=v2。
//! Assistant 的增改查走 byot 以透传 retrieval 工具；Run 以流式创建，事件流交给 sse 适配器。
//! 非流式请求受 request_timeout 约束（也给 async-openai 对 429 / 5xx 的退避重试封顶）；
//! 事件流的等待由会话层的 stream_timeout 约束。
#![allow(deprecated)]

use std::future::Future;
use std::time::Duration;

use async_openai::config::{Config, OPENAI_BETA_HEADER};
use async_openai::error::{ApiError as OpenAIApiError, OpenAIError};
use async_openai::types::assistants::{
    CreateMessageRequest, CreateMessageRequestContent, CreateRunRequest, CreateThreadRequest,
    MessageRole, SubmitToolOutputsRunRequest, ToolsOutputs,
};
use async_openai::Client;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use secrecy::SecretString;

use crate::api::sse::run_event_feed;
use crate::api::traits::{AssistantsApi, EventFeed, ThreadsApi};
use crate::api::types::AssistantObject;
use crate::assistant::AssistantDescriptor;
use crate::config::{ApiSettings, Provider};
use crate::core::{ApiError, AppError};
use crate::stream::events::ToolOutput;

/// 两种提供方共用的 async-openai 配置
pub struct AssistantsConfig {
    api_base: String,
    api_key: SecretString,
    api_version: Option<String>,
    headers: HeaderMap,
}

impl AssistantsConfig {
    pub fn new(settings: &ApiSettings) -> Result<Self, AppError> {
        let invalid_key =
            |_| AppError::Configuration("API key contains invalid characters".into());
        let mut headers = HeaderMap::new();
        match settings.provider {
            Provider::Azure => {
                headers.insert(
                    "api-key",
                    HeaderValue::from_str(&settings.api_key).map_err(invalid_key)?,
                );
            }
            Provider::OpenAi => {
                let bearer = HeaderValue::from_str(&format!("Bearer {}", settings.api_key))
                    .map_err(invalid_key)?;
                headers.insert(AUTHORIZATION, bearer);
                headers.insert(OPENAI_BETA_HEADER, HeaderValue::from_static("assistants=v2"));
            }
        }
        Ok(Self {
            api_base: settings.base_url.clone(),
            api_key: SecretString::from(settings.api_key.clone()),
            api_version: settings.api_version.clone(),
            headers,
        })
    }
}

impl Config for AssistantsConfig {
    fn headers(&self) -> HeaderMap {
        self.headers.clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn query(&self) -> Vec<(&str, &str)> {
        match &self.api_version {
            Some(v) => vec![("api-version", v.as_str())],
            None => Vec::new(),
        }
    }

    fn api_base(&self) -> &str {
        &self.api_base
    }

    fn api_key(&self) -> &SecretString {
        &self.api_key
    }
}

pub struct HttpAssistantClient {
    client: Client<AssistantsConfig>,
    request_timeout: Duration,
}

impl HttpAssistantClient {
    pub fn new(settings: ApiSettings) -> Result<Self, AppError> {
        let config = AssistantsConfig::new(&settings)?;
        // 不设总超时：它会截断长事件流
        let http = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client: Client::with_config(config).with_http_client(http),
            request_timeout: settings.request_timeout,
        })
    }

    async fn call<T>(
        &self,
        request: impl Future<Output = Result<T, OpenAIError>>,
    ) -> Result<T, ApiError> {
        match tokio::time::timeout(self.request_timeout, request).await {
            Ok(result) => result.map_err(map_openai_error),
            Err(_) => Err(ApiError::Transport(format!(
                "request timed out after {:?}",
                self.request_timeout
            ))),
        }
    }
}

/// async-openai 错误 → ApiError；错误体不带 HTTP 状态，NotFound 由 code / message 判断
pub(crate) fn map_openai_error(err: OpenAIError) -> ApiError {
    match err {
        OpenAIError::ApiError(e) if is_not_found(&e) => ApiError::NotFound(e.message),
        OpenAIError::ApiError(e) => ApiError::Rejected {
            code: e.code.or(e.r#type),
            message: e.message,
        },
        OpenAIError::JSONDeserialize(e, _) => ApiError::Decode(e.to_string()),
        other => ApiError::Transport(other.to_string()),
    }
}

/// OpenAI：`No assistant found with id '…'.`；Azure 资源级：code "404" / "NotFound"
fn is_not_found(err: &OpenAIApiError) -> bool {
    if matches!(err.code.as_deref(), Some("404" | "NotFound" | "not_found")) {
        return true;
    }
    let message = err.message.to_ascii_lowercase();
    message.contains("not found")
        || (message.starts_with("no ") && message.contains(" found with id"))
}

#[async_trait]
impl AssistantsApi for HttpAssistantClient {
    async fn create_assistant(
        &self,
        desired: &AssistantDescriptor,
    ) -> Result<AssistantObject, ApiError> {
        self.call(self.client.assistants().create_byot(desired)).await
    }

    async fn retrieve_assistant(&self, id: &str) -> Result<AssistantObject, ApiError> {
        self.call(self.client.assistants().retrieve_byot(id)).await
    }

    async fn update_assistant(
        &self,
        id: &str,
        desired: &AssistantDescriptor,
    ) -> Result<AssistantObject, ApiError> {
        self.call(self.client.assistants().update_byot(id, desired)).await
    }
}

#[async_trait]
impl ThreadsApi for HttpAssistantClient {
    async fn create_thread(&self) -> Result<String, ApiError> {
        let thread = self
            .call(self.client.threads().create(CreateThreadRequest::default()))
            .await?;
        Ok(thread.id)
    }

    async fn post_message(
        &self,
        thread_id: &str,
        assistant_id: &str,
        content: &str,
    ) -> Result<EventFeed, ApiError> {
        let message = CreateMessageRequest {
            role: MessageRole::User,
            content: CreateMessageRequestContent::Content(content.to_string()),
            attachments: None,
            metadata: None,
        };
        // v1 的消息对象带 file_ids 等旧字段，按 JSON 接收
        let _: serde_json::Value = self
            .call(self.client.threads().messages(thread_id).create_byot(&message))
            .await?;

        let run = CreateRunRequest {
            assistant_id: assistant_id.to_string(),
            stream: Some(true),
            ..Default::default()
        };
        let events = self
            .client
            .threads()
            .runs(thread_id)
            .create_stream(run)
            .await
            .map_err(map_openai_error)?;
        Ok(run_event_feed(events))
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<EventFeed, ApiError> {
        let request = SubmitToolOutputsRunRequest {
            tool_outputs: outputs
                .iter()
                .map(|o| ToolsOutputs {
                    tool_call_id: Some(o.tool_call_id.clone()),
                    output: Some(o.output.clone()),
                })
                .collect(),
            stream: Some(true),
        };
        let events = self
            .client
            .threads()
            .runs(thread_id)
            .submit_tool_outputs_stream(run_id, request)
            .await
            .map_err(map_openai_error)?;
        Ok(run_event_feed(events))
    }
}

//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `EMPLEABOT__*` 覆盖（双下划线表示嵌套，如 `EMPLEABOT__API__PROVIDER=openai`）。
//! 另外兼容托管平台的常见变量：AZURE_OPENAI_API_KEY / OPENAI_API_KEY、AZURE_OPENAI_ENDPOINT、
//! AZURE_OPENAI_DEPLOYMENT_NAME（模型）、AZURE_OPENAI_ASSISTANT_ID。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::assistant::{AssistantDescriptor, ToolSpec};
use crate::core::AppError;

pub const DEFAULT_ASSISTANT_NAME: &str = "EmpleaBot";

pub const DEFAULT_INSTRUCTIONS: &str = "You are EmpleaBot, an AI assistant specialized in helping users with their job search and career development needs. You can:
  1. Review and analyze resumes/CVs
  2. Provide job search strategies
  3. Help with interview preparation
  4. Offer career advice and guidance
  5. Assist with professional development planning

  Additional Instructions:
  - Always communicate in the same language the user is using
  - Be professional but friendly
  - Provide specific, actionable advice
  - When reviewing resumes, be thorough and constructive
  - For job search strategies, consider the user's location and industry
  - For interview preparation, include common questions and best practices
  - Always maintain confidentiality of user information";

const DEFAULT_MODEL: &str = "gpt-4";
const DEFAULT_AZURE_API_VERSION: &str = "2024-02-15-preview";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiSection,
    pub assistant: AssistantSection,
    pub session: SessionSection,
}

/// [api] 段：后端、端点、凭证与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    /// azure / openai
    pub provider: String,
    /// azure：资源端点（https://xxx.openai.azure.com）；openai：API 根地址
    pub base_url: Option<String>,
    /// 仅 azure 使用
    pub api_version: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            provider: "azure".to_string(),
            base_url: None,
            api_version: None,
            api_key: None,
            request_timeout_secs: 60,
            connect_timeout_secs: 10,
        }
    }
}

/// [assistant] 段：期望的 Assistant 配置；id 为已持久化的标识（可选）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssistantSection {
    pub id: Option<String>,
    pub name: String,
    pub instructions: String,
    pub model: Option<String>,
    /// 未配置时按提供方取默认：azure 为 code_interpreter + retrieval，openai 为 code_interpreter + file_search
    pub tools: Option<Vec<ToolSpec>>,
}

impl Default for AssistantSection {
    fn default() -> Self {
        Self {
            id: None,
            name: DEFAULT_ASSISTANT_NAME.to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            model: None,
            tools: None,
        }
    }
}

/// [session] 段：事件流空闲超时、工具超时、文件地址前缀、附件大小上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub stream_timeout_secs: u64,
    pub tool_timeout_secs: u64,
    pub files_url_prefix: String,
    pub max_attachment_bytes: usize,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            stream_timeout_secs: 120,
            tool_timeout_secs: 30,
            files_url_prefix: "/api/files".to_string(),
            max_attachment_bytes: 20 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Azure,
    OpenAi,
}

/// 校验后的 API 连接参数
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub provider: Provider,
    /// 已拼好的 API 根地址（azure 为 {endpoint}/openai）
    pub base_url: String,
    pub api_key: String,
    pub api_version: Option<String>,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

/// 会话运行参数
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub stream_timeout: Duration,
    pub tool_timeout: Duration,
    pub files_url_prefix: String,
    pub max_attachment_bytes: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSection::default().into()
    }
}

impl From<SessionSection> for SessionSettings {
    fn from(s: SessionSection) -> Self {
        Self {
            stream_timeout: Duration::from_secs(s.stream_timeout_secs),
            tool_timeout: Duration::from_secs(s.tool_timeout_secs),
            files_url_prefix: s.files_url_prefix,
            max_attachment_bytes: s.max_attachment_bytes,
        }
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

impl AppConfig {
    pub fn api_settings(&self) -> Result<ApiSettings, AppError> {
        self.api_settings_with(env_lookup)
    }

    /// 解析连接参数；缺少凭证或端点时返回 Configuration 错误（与远端失败区分）
    pub fn api_settings_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<ApiSettings, AppError> {
        let provider = self.provider()?;

        let api_key = match provider {
            Provider::Azure => non_empty(self.api.api_key.clone())
                .or_else(|| non_empty(lookup("AZURE_OPENAI_API_KEY"))),
            Provider::OpenAi => {
                non_empty(self.api.api_key.clone()).or_else(|| non_empty(lookup("OPENAI_API_KEY")))
            }
        }
        .ok_or_else(|| AppError::Configuration("API key is not set".into()))?;

        let (base_url, api_version) = match provider {
            Provider::Azure => {
                let endpoint = non_empty(self.api.base_url.clone())
                    .or_else(|| non_empty(lookup("AZURE_OPENAI_ENDPOINT")))
                    .ok_or_else(|| {
                        AppError::Configuration("AZURE_OPENAI_ENDPOINT is not set".into())
                    })?;
                let version = non_empty(self.api.api_version.clone())
                    .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string());
                (
                    format!("{}/openai", endpoint.trim_end_matches('/')),
                    Some(version),
                )
            }
            Provider::OpenAi => {
                let base = non_empty(self.api.base_url.clone())
                    .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
                (base.trim_end_matches('/').to_string(), None)
            }
        };

        Ok(ApiSettings {
            provider,
            base_url,
            api_key,
            api_version,
            request_timeout: Duration::from_secs(self.api.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.api.connect_timeout_secs),
        })
    }

    pub fn provider(&self) -> Result<Provider, AppError> {
        match self.api.provider.to_lowercase().as_str() {
            "azure" => Ok(Provider::Azure),
            "openai" => Ok(Provider::OpenAi),
            other => Err(AppError::Configuration(format!("unknown api provider: {other}"))),
        }
    }

    pub fn desired_assistant(&self) -> Result<AssistantDescriptor, AppError> {
        self.desired_assistant_with(env_lookup)
    }

    /// 本地声明的 Assistant；模型回退到部署名，再回退到默认模型。
    /// openai 走 assistants=v2，不接受 v1 的 retrieval 工具
    pub fn desired_assistant_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<AssistantDescriptor, AppError> {
        let provider = self.provider()?;
        let tools = match (&self.assistant.tools, provider) {
            (Some(tools), _) => tools.clone(),
            (None, Provider::Azure) => vec![ToolSpec::CodeInterpreter, ToolSpec::Retrieval],
            (None, Provider::OpenAi) => vec![ToolSpec::CodeInterpreter, ToolSpec::FileSearch],
        };
        if provider == Provider::OpenAi && tools.contains(&ToolSpec::Retrieval) {
            return Err(AppError::Configuration(
                "the retrieval tool is not available with provider \"openai\"; use file_search"
                    .into(),
            ));
        }
        let model = non_empty(self.assistant.model.clone())
            .or_else(|| non_empty(lookup("AZURE_OPENAI_DEPLOYMENT_NAME")))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let desired = AssistantDescriptor::new(
            self.assistant.name.clone(),
            self.assistant.instructions.clone(),
            model,
            tools,
        );
        desired.validate()?;
        Ok(desired)
    }

    pub fn assistant_id(&self) -> Option<String> {
        self.assistant_id_with(env_lookup)
    }

    /// 已持久化的 Assistant 标识；空串视为未设置
    pub fn assistant_id_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
        non_empty(self.assistant.id.clone())
            .or_else(|| non_empty(lookup("AZURE_OPENAI_ASSISTANT_ID")))
    }

    pub fn session_settings(&self) -> SessionSettings {
        self.session.clone().into()
    }
}

/// 从 config 目录加载配置，环境变量 EMPLEABOT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 EMPLEABOT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("EMPLEABOT")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

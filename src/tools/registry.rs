//! 工具解析
//!
//! Run 进入 requires_action 时，每个工具调用都交给 ToolResolver 得到一段输出文本。
//! 默认的 EmptyOutputResolver 对所有调用返回空串；ToolRegistry 按函数名分发给注册的 Tool。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::assistant::{FunctionSpec, ToolSpec};
use crate::stream::events::ToolCall;

/// 工具调用解析器：返回 Err 时整批工具输出都不会提交
#[async_trait]
pub trait ToolResolver: Send + Sync {
    async fn resolve(&self, call: &ToolCall) -> Result<String, String>;
}

/// 默认解析器：每个调用都回答空输出
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyOutputResolver;

#[async_trait]
impl ToolResolver for EmptyOutputResolver {
    async fn resolve(&self, _call: &ToolCall) -> Result<String, String> {
        Ok(String::new())
    }
}

/// 本地函数：名称、描述、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// 参数 JSON Schema，默认无参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String>;
}

/// 函数注册表：按名称存储 Arc<dyn Tool>
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// 导出为 Assistant 描述中的 function 工具，按名称排序
    pub fn function_specs(&self) -> Vec<ToolSpec> {
        self.tool_names()
            .into_iter()
            .filter_map(|name| self.tools.get(&name).map(|tool| (name, tool)))
            .map(|(name, tool)| ToolSpec::Function {
                function: FunctionSpec {
                    name,
                    description: Some(tool.description().to_string()),
                    parameters: tool.parameters_schema(),
                },
            })
            .collect()
    }
}

#[async_trait]
impl ToolResolver for ToolRegistry {
    async fn resolve(&self, call: &ToolCall) -> Result<String, String> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| format!("Unknown tool: {}", call.name))?;
        let args = if call.input.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&call.input)
                .map_err(|e| format!("Invalid arguments for {}: {e}", call.name))?
        };
        tool.execute(args).await
    }
}

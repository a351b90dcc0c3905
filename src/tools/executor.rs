//! 工具执行器
//!
//! 持有 ToolResolver 与单次调用超时，resolve_all 并发解析 requires_action 中的全部调用，
//! 全部成功才返回按 tool_call_id 对应的输出；任一失败或超时则整批失败（AppError::ToolResolution）。
//! 每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::try_join_all;
use tokio::time::timeout;

use crate::core::AppError;
use crate::stream::events::{ToolCall, ToolOutput};
use crate::tools::{EmptyOutputResolver, ToolResolver};

#[derive(Clone)]
pub struct ToolExecutor {
    resolver: Arc<dyn ToolResolver>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(resolver: Arc<dyn ToolResolver>, timeout: Duration) -> Self {
        Self { resolver, timeout }
    }

    /// 默认执行器：所有调用返回空输出
    pub fn empty(timeout: Duration) -> Self {
        Self::new(Arc::new(EmptyOutputResolver), timeout)
    }

    /// 解析单个调用；超时或解析器返回 Err 都转为 ToolResolution
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolOutput, AppError> {
        let start = Instant::now();
        let result = timeout(self.timeout, self.resolver.resolve(call)).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_label(call),
            "tool_call_id": call.id,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": duration_ms,
            "args_preview": args_preview(&call.input),
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match result {
            Ok(Ok(output)) => Ok(ToolOutput {
                tool_call_id: call.id.clone(),
                output,
            }),
            Ok(Err(e)) => Err(AppError::ToolResolution(format!(
                "{} ({}): {e}",
                tool_label(call),
                call.id
            ))),
            Err(_) => Err(AppError::ToolResolution(format!(
                "{} ({}) timed out after {:?}",
                tool_label(call),
                call.id,
                self.timeout
            ))),
        }
    }

    /// 解析整批调用，输出顺序与输入一致
    pub async fn resolve_all(&self, calls: &[ToolCall]) -> Result<Vec<ToolOutput>, AppError> {
        try_join_all(calls.iter().map(|call| self.execute(call))).await
    }
}

fn tool_label(call: &ToolCall) -> &str {
    if call.name.is_empty() {
        call.kind.as_str()
    } else {
        &call.name
    }
}

fn args_preview(input: &str) -> String {
    if input.len() > 200 {
        format!("{}...", input.chars().take(200).collect::<String>())
    } else {
        input.to_string()
    }
}

//! Assistant 收敛：把远端 Assistant 调整到本地声明的配置
//!
//! 三种情况：无标识 → 创建；有标识且等价 → 不动；有标识但不同 → 整体更新。
//! 只在启动 / 手动预配时调用，不进入请求处理路径；任何远端错误直接上报，不重试。

use std::sync::Arc;

use crate::api::AssistantsApi;
use crate::assistant::AssistantDescriptor;
use crate::core::{ApiError, AppError};

/// 收敛结果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConvergeOutcome {
    Created,
    Updated,
    Unchanged,
}

/// 远端 Assistant 的句柄：标识 + 最近一次观测到的配置
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteAssistantHandle {
    pub id: String,
    pub observed: AssistantDescriptor,
}

/// 启动阶段的收敛结果，显式传给会话构造（不放进全局状态）
#[derive(Clone, Debug, PartialEq)]
pub struct ReconciliationResult {
    pub handle: RemoteAssistantHandle,
    pub outcome: ConvergeOutcome,
}

impl ReconciliationResult {
    pub fn assistant_id(&self) -> &str {
        &self.handle.id
    }
}

pub struct Reconciler {
    api: Arc<dyn AssistantsApi>,
}

impl Reconciler {
    pub fn new(api: Arc<dyn AssistantsApi>) -> Self {
        Self { api }
    }

    pub async fn converge(
        &self,
        desired: &AssistantDescriptor,
        observed_id: Option<&str>,
    ) -> Result<ReconciliationResult, AppError> {
        desired.validate()?;

        let Some(id) = observed_id else {
            tracing::info!("Creating new assistant '{}'...", desired.name);
            let created = self.api.create_assistant(desired).await?;
            tracing::info!("New assistant created: {} ({})", desired.name, created.id);
            return Ok(ReconciliationResult {
                handle: RemoteAssistantHandle {
                    observed: created.descriptor(),
                    id: created.id,
                },
                outcome: ConvergeOutcome::Created,
            });
        };

        let existing = match self.api.retrieve_assistant(id).await {
            Ok(a) => a,
            Err(ApiError::NotFound(reason)) => {
                // 不自动新建替代品：旧标识可能仍被别处引用
                tracing::warn!("Assistant {} not found: {}", id, reason);
                return Err(AppError::AssistantUnavailable {
                    id: id.to_string(),
                    reason,
                });
            }
            Err(e) => {
                tracing::warn!("Failed to retrieve assistant {}: {}", id, e);
                return Err(e.into());
            }
        };
        let observed = existing.descriptor();
        tracing::info!("Assistant found: {} ({})", observed.name, existing.id);

        if desired.is_equivalent(&observed) {
            return Ok(ReconciliationResult {
                handle: RemoteAssistantHandle {
                    id: existing.id,
                    observed,
                },
                outcome: ConvergeOutcome::Unchanged,
            });
        }

        tracing::info!(
            "Updating assistant configuration ({})...",
            desired.diff_fields(&observed).join(", ")
        );
        let updated = self.api.update_assistant(id, desired).await?;
        tracing::info!("Assistant updated: {}", desired.name);
        Ok(ReconciliationResult {
            handle: RemoteAssistantHandle {
                observed: updated.descriptor(),
                id: updated.id,
            },
            outcome: ConvergeOutcome::Updated,
        })
    }
}

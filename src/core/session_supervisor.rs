//! 会话监管：生命周期、中断管理
//!
//! 持有 CancellationToken；会话拆除时取消，正在等待的事件流与工具解析在下一个挂起点退出。

use tokio_util::sync::CancellationToken;

/// 会话级取消令牌
#[derive(Debug, Clone)]
pub struct SessionSupervisor {
    cancel_token: CancellationToken,
}

impl SessionSupervisor {
    pub fn new() -> Self {
        Self {
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// 触发取消（会话拆除 / Ctrl+C）
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// 会话是否已拆除（取消或致命错误）
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// 创建子 token（单次工具解析）
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }
}

impl Default for SessionSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

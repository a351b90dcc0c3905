//! 会话编排器：单写者 actor
//!
//! 建立 cmd / state 两个通道：UI 通过 mpsc 发送 Command，后台任务独占 SessionController
//! 逐条处理（同一会话的记录只有一个写者），每次状态变化经 watch 发布 UiState 快照。
//! 会话拆除走 SessionSupervisor 的取消令牌，正在进行的 Run 会在下一个挂起点退出。
//! 命令出错时按 AppError::recovery() 处理：RetryUpload / ReenableInput 展示错误后继续，
//! Abort 展示错误后取消会话并退出。

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::api::ThreadsApi;
use crate::assistant::ReconciliationResult;
use crate::config::SessionSettings;
use crate::core::{AppError, ExtractionError, RecoveryAction, SessionSupervisor, UiState};
use crate::extract::media_type_for;
use crate::session::SessionController;
use crate::tools::ToolExecutor;

/// 从 UI 发往会话的命令
#[derive(Debug, Clone)]
pub enum Command {
    /// 提交用户输入
    Submit(String),
    /// 提交第 n 个预置建议（从 0 开始）
    Suggest(usize),
    /// 读取本地文件作为附件
    Attach { path: PathBuf },
    /// 移除待发送附件
    Detach,
    /// 结束会话
    Quit,
}

/// 会话句柄：命令发送端、状态接收端与取消入口
pub struct SessionHandle {
    cmd_tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<UiState>,
    supervisor: SessionSupervisor,
    thread_id: String,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn send(&self, cmd: Command) -> Result<(), AppError> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| AppError::Cancelled)
    }

    pub fn state(&self) -> watch::Receiver<UiState> {
        self.state_rx.clone()
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// 拆除会话：中断进行中的 Run，actor 退出
    pub fn cancel(&self) {
        self.supervisor.cancel();
    }

    /// 会话已被取消或因致命错误终止
    pub fn is_closed(&self) -> bool {
        self.supervisor.is_cancelled()
    }

    /// 会话关闭时完成
    pub async fn closed(&self) {
        let token = self.supervisor.cancel_token();
        token.cancelled().await;
    }

    /// 等待 actor 退出（Quit、取消或命令端全部关闭之后）
    pub async fn join(self) {
        drop(self.cmd_tx);
        if let Err(e) = self.task.await {
            tracing::error!("Session task failed: {}", e);
        }
    }
}

/// 创建会话并在后台运行；线程在此创建，失败直接返回
pub async fn spawn_session(
    threads: Arc<dyn ThreadsApi>,
    assistant: &ReconciliationResult,
    executor: ToolExecutor,
    settings: SessionSettings,
) -> Result<SessionHandle, AppError> {
    let supervisor = SessionSupervisor::new();
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Command>();
    let (state_tx, state_rx) = watch::channel(UiState::default());

    let mut controller =
        SessionController::start(threads, assistant, executor, settings, &supervisor)
            .await?
            .with_ui(state_tx);
    let thread_id = controller.thread_id().to_string();

    let cancel = supervisor.cancel_token();
    let teardown = supervisor.clone();
    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Session cancelled, shutting down");
                    break;
                }
                Some(cmd) = cmd_rx.recv() => {
                    if matches!(cmd, Command::Quit) {
                        break;
                    }
                    let Err(e) = handle(&mut controller, cmd).await else {
                        continue;
                    };
                    controller.report_error(&e);
                    match e.recovery() {
                        RecoveryAction::RetryUpload | RecoveryAction::ReenableInput => {
                            tracing::warn!("Command failed: {}", e);
                        }
                        RecoveryAction::Abort => {
                            tracing::error!("Session aborted: {}", e);
                            teardown.cancel();
                            break;
                        }
                    }
                }
                else => break,  // cmd_tx 已关闭，退出循环
            }
        }
    });

    Ok(SessionHandle {
        cmd_tx,
        state_rx,
        supervisor,
        thread_id,
        task,
    })
}

async fn handle(controller: &mut SessionController, cmd: Command) -> Result<(), AppError> {
    match cmd {
        Command::Submit(input) => controller.submit(&input).await,
        Command::Suggest(index) => controller.submit_suggestion(index).await,
        Command::Attach { path } => {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| ExtractionError::Io(format!("{}: {e}", path.display())))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            controller
                .attach_document(bytes, &media_type_for(&path), &name)
                .await
        }
        Command::Detach => controller.discard_attachment().map(|_| ()),
        Command::Quit => Ok(()),
    }
}

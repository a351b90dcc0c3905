//! 会话控制器
//!
//! 一个会话对应一个远端线程（启动时创建一次并缓存）。提交时把待发送附件合并进用户消息，
//! 发往线程并消费返回的 Run 事件流；requires_action 时批量解析工具调用并按 run_id 提交，
//! 再继续消费新的事件流。每次等待事件都受空闲超时与取消令牌约束，出错时强制恢复输入。

use std::future::Future;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::api::{EventFeed, ThreadsApi};
use crate::assistant::ReconciliationResult;
use crate::config::SessionSettings;
use crate::core::{ApiError, AppError, RunState, SessionSupervisor, UiState};
use crate::extract::PdfExtractor;
use crate::memory::{AttachmentSlot, Message, PendingAttachment, TranscriptStore};
use crate::stream::{Effect, StreamReconstructor};
use crate::tools::ToolExecutor;

/// 预置的求职建议问题
pub const SUGGESTIONS: [&str; 4] = [
    "¿Qué áreas de mi CV necesitan mejora?",
    "¿Qué habilidades debería destacar?",
    "¿Como Adaptar mi CV para el sector tecnológico?",
    "¿Faltan secciones importantes?",
];

/// 组装发往线程的消息：有附件时在用户输入前嵌入文件名与提取文本
pub fn assemble_message(input: &str, attachment: Option<&PendingAttachment>) -> String {
    match attachment {
        Some(a) => format!(
            "PDF Content from {}:\n{}\n\nUser Query: {}",
            a.display_name, a.extracted_text, input
        ),
        None => input.to_string(),
    }
}

pub struct SessionController {
    threads: Arc<dyn ThreadsApi>,
    assistant_id: String,
    thread_id: String,
    transcript: TranscriptStore,
    reconstructor: StreamReconstructor,
    attachment: AttachmentSlot,
    extractor: PdfExtractor,
    executor: ToolExecutor,
    settings: SessionSettings,
    cancel: CancellationToken,
    last_error: Option<String>,
    ui_tx: Option<watch::Sender<UiState>>,
}

impl SessionController {
    /// 创建线程并构造会话；线程在整个会话生命周期内复用
    pub async fn start(
        threads: Arc<dyn ThreadsApi>,
        assistant: &ReconciliationResult,
        executor: ToolExecutor,
        settings: SessionSettings,
        supervisor: &SessionSupervisor,
    ) -> Result<Self, AppError> {
        let thread_id = threads.create_thread().await?;
        tracing::info!(
            "Session started: thread {} with assistant {}",
            thread_id,
            assistant.assistant_id()
        );
        Ok(Self {
            threads,
            assistant_id: assistant.assistant_id().to_string(),
            thread_id,
            transcript: TranscriptStore::new(),
            reconstructor: StreamReconstructor::new(settings.files_url_prefix.clone()),
            attachment: AttachmentSlot::default(),
            extractor: PdfExtractor::new(settings.max_attachment_bytes),
            executor,
            settings,
            cancel: supervisor.child_token(),
            last_error: None,
            ui_tx: None,
        })
    }

    /// 每次状态变化都向该通道发布 UiState 快照
    pub fn with_ui(mut self, ui_tx: watch::Sender<UiState>) -> Self {
        self.ui_tx = Some(ui_tx);
        self.publish();
        self
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn transcript(&self) -> &TranscriptStore {
        &self.transcript
    }

    pub fn state(&self) -> RunState {
        self.reconstructor.state()
    }

    pub fn input_enabled(&self) -> bool {
        self.reconstructor.input_enabled() && !self.attachment.is_processing()
    }

    pub fn pending_attachment(&self) -> Option<&PendingAttachment> {
        self.attachment.pending()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn snapshot(&self) -> UiState {
        UiState {
            phase: self.reconstructor.state(),
            history: self.transcript.snapshot(),
            input_locked: !self.input_enabled(),
            error_message: self.last_error.clone(),
            attachment: self.attachment.display_name().map(str::to_string),
            processing_attachment: self.attachment.is_processing(),
        }
    }

    /// 记录会话外层（命令分发）发现的错误，并展示给 UI
    pub fn report_error(&mut self, err: &AppError) {
        self.last_error = Some(err.to_string());
        self.publish();
    }

    fn publish(&self) {
        if let Some(tx) = &self.ui_tx {
            tx.send_replace(self.snapshot());
        }
    }

    /// 提取文档并放入附件槽；新附件替换之前就绪的附件，提取失败时附件槽保持原样
    pub async fn attach_document(
        &mut self,
        bytes: Vec<u8>,
        media_type: &str,
        name: &str,
    ) -> Result<(), AppError> {
        if !self.reconstructor.input_enabled() {
            return Err(AppError::Busy("cannot attach while a run is in progress".into()));
        }
        let previous = self.attachment.begin(name)?;
        self.last_error = None;
        self.publish();

        let result = self.extractor.extract(bytes, media_type, name).await;
        let outcome = match result {
            Ok(doc) => {
                self.attachment.complete(PendingAttachment {
                    display_name: doc.name,
                    extracted_text: doc.text,
                });
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Attachment {} rejected: {}", name, e);
                self.attachment.fail(previous);
                let err = AppError::from(e);
                self.last_error = Some(err.to_string());
                Err(err)
            }
        };
        self.publish();
        outcome
    }

    /// 移除待发送附件
    pub fn discard_attachment(&mut self) -> Result<Option<PendingAttachment>, AppError> {
        if !self.reconstructor.input_enabled() {
            return Err(AppError::Busy("cannot detach while a run is in progress".into()));
        }
        let removed = self.attachment.discard();
        self.publish();
        Ok(removed)
    }

    /// 以预置建议作为用户输入提交
    pub async fn submit_suggestion(&mut self, index: usize) -> Result<(), AppError> {
        let prompt = SUGGESTIONS
            .get(index)
            .ok_or_else(|| AppError::InvalidInput(format!("no suggestion #{}", index + 1)))?;
        self.submit(prompt).await
    }

    /// 提交用户输入并驱动整个 Run 直到完成、失败、超时或取消
    ///
    /// 附件只在远端接受消息、返回事件流之后才从附件槽移除；在此之前失败时附件保留，重试仍会带上。
    pub async fn submit(&mut self, input: &str) -> Result<(), AppError> {
        if input.trim().is_empty() {
            return Err(AppError::InvalidInput("empty message".into()));
        }
        if self.attachment.is_processing() {
            return Err(AppError::Busy("attachment is still being processed".into()));
        }
        self.reconstructor.begin_run()?;

        let content = assemble_message(input, self.attachment.pending());
        self.transcript.push(Message::user(input));
        self.last_error = None;
        self.publish();

        let result = self.drive(&content).await;
        if let Err(e) = &result {
            tracing::warn!("Run ended with error: {}", e);
            self.reconstructor.abort();
            self.last_error = Some(e.to_string());
        }
        self.publish();
        result
    }

    async fn drive(&mut self, content: &str) -> Result<(), AppError> {
        let threads = self.threads.clone();

        let mut feed = self
            .open_feed(
                "message post",
                threads.post_message(&self.thread_id, &self.assistant_id, content),
            )
            .await?;
        if let Some(sent) = self.attachment.take() {
            tracing::info!("Attachment {} sent with message", sent.display_name);
            self.publish();
        }

        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => return Err(AppError::Cancelled),
                next = tokio::time::timeout(self.settings.stream_timeout, feed.next()) => next,
            };
            let event = match next {
                Err(_) => {
                    return Err(AppError::StreamProtocol(format!(
                        "no event received within {:?}",
                        self.settings.stream_timeout
                    )))
                }
                Ok(None) => {
                    return Err(AppError::StreamProtocol(
                        "event stream closed before run completed".into(),
                    ))
                }
                Ok(Some(event)) => event?,
            };

            let transition = self.reconstructor.apply(event, &mut self.transcript)?;
            self.publish();

            match transition.effect {
                Effect::None => {}
                Effect::Finished => {
                    tracing::info!("Run completed on thread {}", self.thread_id);
                    return Ok(());
                }
                Effect::ResolveTools { run_id, tool_calls } => {
                    let outputs = tokio::select! {
                        _ = self.cancel.cancelled() => return Err(AppError::Cancelled),
                        outputs = self.executor.resolve_all(&tool_calls) => outputs?,
                    };
                    tracing::info!(
                        "Submitting {} tool output(s) for run {}",
                        outputs.len(),
                        run_id
                    );
                    feed = self
                        .open_feed(
                            "tool output submission",
                            threads.submit_tool_outputs(&self.thread_id, &run_id, &outputs),
                        )
                        .await?;
                    self.reconstructor.resume_streaming();
                    self.publish();
                }
            }
        }
    }

    /// 等待远端返回事件流：受取消令牌与 stream_timeout 约束，远端失败按会话期错误归类
    async fn open_feed(
        &self,
        what: &str,
        request: impl Future<Output = Result<EventFeed, ApiError>>,
    ) -> Result<EventFeed, AppError> {
        let opened = tokio::select! {
            _ = self.cancel.cancelled() => return Err(AppError::Cancelled),
            opened = tokio::time::timeout(self.settings.stream_timeout, request) => opened,
        };
        match opened {
            Err(_) => Err(AppError::StreamProtocol(format!(
                "{what} not answered within {:?}",
                self.settings.stream_timeout
            ))),
            Ok(feed) => feed.map_err(AppError::during_run),
        }
    }
}

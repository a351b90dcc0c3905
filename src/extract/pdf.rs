//! PDF 文本提取
//!
//! 只接受 application/pdf；逐页提取文本，页内以单个空格连接，页间换行，最后去掉首尾空白。
//! 页内的空白统一折叠：文本项之间、以及单个文本项内部的连续空白都变成一个空格，
//! 文本项自带的多余空格不保留。
//! 解析在阻塞线程中进行。提取 worker 进程内只初始化一次，限制全进程并发解析数；
//! 每个 PdfExtractor（即每个会话）同一时刻只允许一个文档在处理。

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tokio::sync::Semaphore;

use crate::core::ExtractionError;

pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// 提取结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub text: String,
    pub name: String,
}

/// 进程级提取 worker：限制同时进行的 CPU 密集解析
struct ExtractionWorker {
    parses: Arc<Semaphore>,
}

static WORKER: OnceCell<ExtractionWorker> = OnceCell::new();

/// 初始化提取 worker；可重复调用，只执行一次
fn init_worker() -> &'static ExtractionWorker {
    WORKER.get_or_init(|| {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);
        tracing::info!("PDF extraction worker initialized ({} parallel parses)", parallelism);
        ExtractionWorker {
            parses: Arc::new(Semaphore::new(parallelism)),
        }
    })
}

#[derive(Clone, Debug)]
pub struct PdfExtractor {
    max_bytes: usize,
    /// 单许可：本会话的提取不与自身并发
    in_flight: Arc<Semaphore>,
}

impl PdfExtractor {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            in_flight: Arc::new(Semaphore::new(1)),
        }
    }

    /// 校验类型与大小后在阻塞线程中解析；另一个文档仍在解析时返回 Busy
    pub async fn extract(
        &self,
        bytes: Vec<u8>,
        media_type: &str,
        name: &str,
    ) -> Result<ExtractedDocument, ExtractionError> {
        check_media_type(media_type)?;
        if bytes.len() > self.max_bytes {
            return Err(ExtractionError::TooLarge {
                size: bytes.len(),
                max: self.max_bytes,
            });
        }

        let _in_flight = self
            .in_flight
            .clone()
            .try_acquire_owned()
            .map_err(|_| ExtractionError::Busy)?;
        let _parse = init_worker()
            .parses
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| ExtractionError::Parse(format!("extraction worker closed: {e}")))?;

        tracing::info!("Starting PDF extraction for: {}", name);
        let text = tokio::task::spawn_blocking(move || extract_text(&bytes))
            .await
            .map_err(|e| ExtractionError::Parse(format!("extraction task failed: {e}")))??;
        tracing::info!("PDF extraction completed: {} ({} chars)", name, text.len());

        Ok(ExtractedDocument {
            text,
            name: name.to_string(),
        })
    }
}

fn check_media_type(media_type: &str) -> Result<(), ExtractionError> {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if essence == PDF_MEDIA_TYPE {
        Ok(())
    } else {
        Err(ExtractionError::UnsupportedType(media_type.to_string()))
    }
}

/// 同步提取：页号从 1 开始按顺序处理，任何一页失败都整体失败
pub fn extract_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| ExtractionError::Parse(e.to_string()))?;
    let pages = doc.get_pages();
    tracing::debug!("PDF loaded, number of pages: {}", pages.len());

    let mut full = String::new();
    for page_number in pages.keys() {
        let raw = doc
            .extract_text(&[*page_number])
            .map_err(|e| ExtractionError::Parse(format!("page {page_number}: {e}")))?;
        let page_text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        full.push_str(&page_text);
        full.push('\n');
    }
    Ok(full.trim().to_string())
}

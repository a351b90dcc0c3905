//! 附件提取：上传文档 → 纯文本

pub mod pdf;

use std::path::Path;

pub use pdf::{ExtractedDocument, PdfExtractor, PDF_MEDIA_TYPE};

/// 按扩展名推断本地文件的媒体类型，未知时为 application/octet-stream
pub fn media_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

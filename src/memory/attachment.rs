//! 待发送附件：提取好的 PDF 文本，合并进下一条用户消息
//!
//! 任一时刻最多一个待发送附件；提取进行中时拒绝新的选择。

use crate::core::ExtractionError;

/// 待发送附件
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingAttachment {
    pub display_name: String,
    pub extracted_text: String,
}

/// 附件槽：空 / 处理中 / 就绪
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum AttachmentSlot {
    #[default]
    Empty,
    Processing { display_name: String },
    Ready(PendingAttachment),
}

impl AttachmentSlot {
    /// 标记开始处理，返回之前就绪的附件；已有处理中的附件时返回 Busy
    pub fn begin(
        &mut self,
        display_name: &str,
    ) -> Result<Option<PendingAttachment>, ExtractionError> {
        if self.is_processing() {
            return Err(ExtractionError::Busy);
        }
        let previous = self.take();
        *self = AttachmentSlot::Processing {
            display_name: display_name.to_string(),
        };
        Ok(previous)
    }

    /// 提取成功，替换掉之前就绪的附件
    pub fn complete(&mut self, attachment: PendingAttachment) {
        *self = AttachmentSlot::Ready(attachment);
    }

    /// 提取失败：丢弃新文档，恢复 begin 前就绪的附件
    pub fn fail(&mut self, previous: Option<PendingAttachment>) {
        *self = match previous {
            Some(a) => AttachmentSlot::Ready(a),
            None => AttachmentSlot::Empty,
        };
    }

    /// 取出就绪附件（发送时消费）
    pub fn take(&mut self) -> Option<PendingAttachment> {
        match std::mem::take(self) {
            AttachmentSlot::Ready(a) => Some(a),
            other => {
                *self = other;
                None
            }
        }
    }

    /// 用户主动移除
    pub fn discard(&mut self) -> Option<PendingAttachment> {
        self.take()
    }

    pub fn is_processing(&self) -> bool {
        matches!(self, AttachmentSlot::Processing { .. })
    }

    pub fn pending(&self) -> Option<&PendingAttachment> {
        match self {
            AttachmentSlot::Ready(a) => Some(a),
            _ => None,
        }
    }

    /// UI 展示的文件名（处理中或就绪）
    pub fn display_name(&self) -> Option<&str> {
        match self {
            AttachmentSlot::Empty => None,
            AttachmentSlot::Processing { display_name } => Some(display_name),
            AttachmentSlot::Ready(a) => Some(&a.display_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cv() -> PendingAttachment {
        PendingAttachment {
            display_name: "cv.pdf".into(),
            extracted_text: "X".into(),
        }
    }

    #[test]
    fn test_take_consumes_once() {
        let mut slot = AttachmentSlot::default();
        slot.begin("cv.pdf").unwrap();
        slot.complete(cv());
        assert_eq!(slot.take(), Some(cv()));
        assert_eq!(slot.take(), None);
        assert_eq!(slot, AttachmentSlot::Empty);
    }

    #[test]
    fn test_second_selection_rejected_while_processing() {
        let mut slot = AttachmentSlot::default();
        slot.begin("a.pdf").unwrap();
        assert_eq!(slot.begin("b.pdf"), Err(ExtractionError::Busy));
        assert_eq!(slot.display_name(), Some("a.pdf"));
        // 处理中时 take 不应丢失状态
        assert_eq!(slot.take(), None);
        assert!(slot.is_processing());
    }

    #[test]
    fn test_failure_clears_slot() {
        let mut slot = AttachmentSlot::default();
        let previous = slot.begin("a.pdf").unwrap();
        slot.fail(previous);
        assert_eq!(slot.display_name(), None);
    }

    #[test]
    fn test_failure_keeps_previous_ready_attachment() {
        let mut slot = AttachmentSlot::default();
        slot.begin("cv.pdf").unwrap();
        slot.complete(cv());
        let previous = slot.begin("notes.txt").unwrap();
        assert_eq!(previous, Some(cv()));
        slot.fail(previous);
        assert_eq!(slot.pending(), Some(&cv()));
    }
}

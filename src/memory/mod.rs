//! 会话内存：消息记录与待发送附件（仅在会话生命周期内保存，不落盘）

pub mod attachment;
pub mod transcript;

pub use attachment::{AttachmentSlot, PendingAttachment};
pub use transcript::{Message, Role, TranscriptStore};

//! Run 事件与流式重建

pub mod events;
pub mod reconstructor;

pub use events::{Annotation, RunEvent, ToolCall, ToolCallKind, ToolOutput};
pub use reconstructor::{Effect, StreamReconstructor, Transition};

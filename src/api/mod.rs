//! 远端层：Assistants / Threads 抽象与实现（HTTP / Mock）

pub mod client;
pub mod mock;
pub mod sse;
pub mod traits;
pub mod types;

pub use client::{AssistantsConfig, HttpAssistantClient};
pub use mock::{MockBackend, MockCalls, MockFeed, MockOp};
pub use traits::{AssistantsApi, EventFeed, ThreadsApi};
pub use types::AssistantObject;

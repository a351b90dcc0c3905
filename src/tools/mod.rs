//! 工具解析层：requires_action 中的调用 → 工具输出

pub mod executor;
pub mod registry;

pub use executor::ToolExecutor;
pub use registry::{EmptyOutputResolver, Tool, ToolRegistry, ToolResolver};

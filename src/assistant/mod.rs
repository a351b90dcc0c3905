//! 远端 Assistant：期望配置描述与收敛

pub mod descriptor;
pub mod reconciler;

pub use descriptor::{AssistantDescriptor, FunctionSpec, ToolSpec};
pub use reconciler::{ConvergeOutcome, ReconciliationResult, Reconciler, RemoteAssistantHandle};

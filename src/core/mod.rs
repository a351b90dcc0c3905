//! 核心层：错误与恢复、状态投影、会话监管、会话 actor

pub mod error;
pub mod orchestrator;
pub mod session_supervisor;
pub mod state;

pub use error::{ApiError, AppError, ExtractionError, RecoveryAction};
pub use orchestrator::{spawn_session, Command, SessionHandle};
pub use session_supervisor::SessionSupervisor;
pub use state::{RunState, UiState};

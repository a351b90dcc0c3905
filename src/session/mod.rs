//! 会话层：线程、消息组装、Run 驱动

pub mod controller;

pub use controller::{assemble_message, SessionController, SUGGESTIONS};

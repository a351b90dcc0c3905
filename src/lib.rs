//! EmpleaBot - 基于 Assistants API 的求职简历助手
//!
//! 模块划分：
//! - **api**: 远端 Assistants / Threads 抽象、HTTP 客户端、SSE 解码与 Mock 后端
//! - **assistant**: 期望的 Assistant 配置与启动时收敛（创建 / 更新 / 不动）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误与恢复、状态投影、会话监管、会话 actor
//! - **extract**: PDF 附件文本提取
//! - **memory**: 会话记录与待发送附件
//! - **observability**: 日志初始化
//! - **session**: 会话控制器（线程、消息组装、Run 驱动）
//! - **stream**: Run 事件与流式重建状态机
//! - **tools**: 工具调用解析与执行器

pub mod api;
pub mod assistant;
pub mod config;
pub mod core;
pub mod extract;
pub mod memory;
pub mod observability;
pub mod session;
pub mod stream;
pub mod tools;

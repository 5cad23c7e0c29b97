//! Steward - 工具调用型对话 Agent 编排引擎
//!
//! 模块划分：
//! - **agent**: 推理主循环、事件、语音安全输出与组装
//! - **catalog**: 工具目录（名称、参数、READ / WRITE 安全级别）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型与恢复策略
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **memory**: 按用户的会话历史与会话存储（内存 / SQLite）
//! - **observability**: 日志初始化
//! - **tools**: 工具注册表、调度、执行上下文
//! - **translation**: 多提供方翻译级联

pub mod agent;
pub mod catalog;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod tools;
pub mod translation;

pub use agent::{AgentExecutor, AgentResult};

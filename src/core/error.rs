//! Agent 错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：根据 AgentError 决定回灌模型继续推理 / 降级 / 终止本次运行。

use thiserror::Error;

use crate::llm::LlmError;

/// Agent 运行过程中可能出现的错误（目录校验、工具、模型服务、翻译、会话存储等）
#[derive(Error, Debug)]
pub enum AgentError {
    /// 工具目录条目不合法（启动期，进程级致命）
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("Tool {tool} failed: {reason}")]
    ToolExecution { tool: String, reason: String },

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Model service error: {0}")]
    ModelService(#[from] LlmError),

    #[error("Model service timeout")]
    ModelTimeout,

    /// 翻译级联内部吸收，不会向调用方暴露
    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Session store unavailable: {0}")]
    SessionStoreUnavailable(String),

    /// 配置加载或校验失败（启动期）
    #[error("Config error: {0}")]
    Config(String),

    #[error("Cancelled")]
    Cancelled,
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 将失败描述作为 Observation 回灌模型，继续本轮推理
    ObserveAndContinue(String),
    /// 吸收错误并降级（空历史 / 原文不翻译）
    Degrade,
    /// 终止当前运行，向用户返回通用致歉
    Abort,
}

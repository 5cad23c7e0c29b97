//! 错误恢复引擎
//!
//! 根据 AgentError 类型返回 RecoveryAction，供主循环决定是回灌模型、降级还是终止。
//! 只有模型服务失败与取消会终止运行；其余失败都被吸收，用户永远看不到原始技术错误。

use crate::core::{AgentError, RecoveryAction};

/// 语义化错误恢复：将错误映射为可执行动作
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, err: &AgentError) -> RecoveryAction {
        match err {
            AgentError::UnknownTool(name) => RecoveryAction::ObserveAndContinue(format!(
                "Tool '{name}' does not exist. Use only the tools you were given, or ask the user for clarification."
            )),
            AgentError::InvalidArguments { tool, reason } => {
                RecoveryAction::ObserveAndContinue(format!(
                    "Arguments for '{tool}' were rejected: {reason}. Correct the arguments or ask the user for the missing details."
                ))
            }
            AgentError::ToolExecution { tool, reason } => RecoveryAction::ObserveAndContinue(
                format!("Tool '{tool}' failed: {reason}"),
            ),
            AgentError::ToolTimeout(tool) => RecoveryAction::ObserveAndContinue(format!(
                "Tool '{tool}' timed out. Tell the user the operation could not be completed right now."
            )),
            AgentError::Translation(_) | AgentError::SessionStoreUnavailable(_) => {
                RecoveryAction::Degrade
            }
            AgentError::ModelService(_)
            | AgentError::ModelTimeout
            | AgentError::Cancelled
            | AgentError::Validation(_)
            | AgentError::Config(_) => RecoveryAction::Abort,
        }
    }
}

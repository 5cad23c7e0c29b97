//! 工具执行结果：每次调度产出一条，折叠进对话作为 tool 轮

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::catalog::SafetyClass;

/// 工具处理器成功时的输出：人类可读消息 + 结构化数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub message: String,
    pub data: Value,
}

impl ToolOutput {
    pub fn new(message: impl Into<String>, data: Value) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self::new(message, Value::Object(Default::default()))
    }
}

/// 单次工具调度结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecutionResult {
    pub call_id: String,
    pub tool_name: String,
    pub success: bool,
    pub message: String,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 未知工具时为 None
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety: Option<SafetyClass>,
    pub duration_ms: u64,
}

impl ToolExecutionResult {
    pub fn succeeded(
        call_id: &str,
        tool_name: &str,
        safety: SafetyClass,
        output: ToolOutput,
        duration_ms: u64,
    ) -> Self {
        Self {
            call_id: call_id.to_string(),
            tool_name: tool_name.to_string(),
            success: true,
            message: output.message,
            data: output.data,
            error: None,
            safety: Some(safety),
            duration_ms,
        }
    }

    pub fn failed(
        call_id: &str,
        tool_name: &str,
        safety: Option<SafetyClass>,
        message: String,
        error: String,
        duration_ms: u64,
    ) -> Self {
        Self {
            call_id: call_id.to_string(),
            tool_name: tool_name.to_string(),
            success: false,
            message,
            data: Value::Null,
            error: Some(error),
            safety,
            duration_ms,
        }
    }

    /// 成功执行的 WRITE 工具
    pub fn is_successful_write(&self) -> bool {
        self.success && self.safety == Some(SafetyClass::Write)
    }

    /// 写入 tool 轮的内容：结构化 JSON，供下一轮推理读取
    pub fn to_observation(&self) -> String {
        let mut obs = json!({
            "success": self.success,
            "message": self.message,
            "data": self.data,
        });
        if let Some(err) = &self.error {
            obs["error"] = Value::String(err.clone());
        }
        obs.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observation_contains_failure_detail() {
        let r = ToolExecutionResult::failed(
            "c1",
            "does_not_exist",
            None,
            "Tool 'does_not_exist' does not exist.".into(),
            "Unknown tool: does_not_exist".into(),
            0,
        );
        let obs: Value = serde_json::from_str(&r.to_observation()).unwrap();
        assert_eq!(obs["success"], false);
        assert_eq!(obs["error"], "Unknown tool: does_not_exist");
        assert!(!r.is_successful_write());
    }

    #[test]
    fn test_successful_write_flag() {
        let r = ToolExecutionResult::succeeded(
            "c1",
            "update_item",
            SafetyClass::Write,
            ToolOutput::message("Updated"),
            3,
        );
        assert!(r.is_successful_write());
        let obs: Value = serde_json::from_str(&r.to_observation()).unwrap();
        assert!(obs.get("error").is_none());
    }
}

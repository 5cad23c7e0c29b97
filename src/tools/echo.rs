//! Echo 工具（测试与本地演示用，READ 类）

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::catalog::{ParamType, ToolDefinition};
use crate::tools::{ExecutionContext, Tool, ToolOutput};

/// Echo 工具：回显文本
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::read("echo", "Echo text back unchanged (for testing).")
            .required_param("text", ParamType::String, "Text to echo")
    }

    async fn execute(
        &self,
        _ctx: &mut ExecutionContext,
        args: Map<String, Value>,
    ) -> Result<ToolOutput, String> {
        let text = args
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or("(empty)");
        Ok(ToolOutput::new(text, json!({ "text": text })))
    }
}

//! Agent 过程事件：供语音 / Web 等前端展示推理轮次、工具调用与观察

use serde::Serialize;

/// 单步过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// 输入已翻译为工作语言
    Translated { from: String, to: String },
    /// 推理轮次更新（当前第几轮）
    Turn { turn: usize, max_turns: usize },
    /// 正在调用模型
    Thinking,
    /// 调度工具
    ToolCall {
        id: String,
        tool: String,
        args: String,
    },
    /// 工具返回（预览，避免过长）
    Observation {
        tool: String,
        success: bool,
        preview: String,
    },
    /// 最终回复
    Final { text: String },
    /// 达到轮次上限，返回降级回复
    Degraded,
    /// WRITE 工具成功，会话已清空
    SessionCleared,
    /// 错误（仅用于展示，不含原始技术细节之外的内容）
    Error { text: String },
}

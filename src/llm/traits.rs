//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / DeepSeek / Mock）实现 LlmClient：chat 接收完整消息列表、工具目录与采样配置，
//! 返回「一组工具调用」或「纯文本回复」。

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::memory::{Message, ToolCallRequest};

/// 模型服务错误：超时、网络、配额、响应格式等；对当前运行致命
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("api error: {0}")]
    Api(String),
}

/// 采样配置；默认温度 0，保证推理可复现
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingConfig {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: None,
        }
    }
}

/// 一次模型调用的输入：有序消息、工具目录（function-calling JSON）、采样配置
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub messages: &'a [Message],
    pub tools: &'a [Value],
    pub sampling: &'a SamplingConfig,
}

/// 模型输出：要么是有序的工具调用列表，要么是最终文本
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmResponse {
    /// content 为模型随工具调用附带的文本（通常为空）
    ToolCalls {
        content: String,
        calls: Vec<ToolCallRequest>,
    },
    Text(String),
}

impl LlmResponse {
    pub fn text(s: impl Into<String>) -> Self {
        LlmResponse::Text(s.into())
    }

    pub fn tool_call(id: &str, name: &str, arguments: &str) -> Self {
        LlmResponse::ToolCalls {
            content: String::new(),
            calls: vec![ToolCallRequest::new(id, name, arguments)],
        }
    }
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 带工具目录的对话补全
    async fn chat(&self, request: ChatRequest<'_>) -> Result<LlmResponse, LlmError>;

    /// 无工具的纯文本补全（翻译等辅助用途）；模型若仍返回工具调用视为格式错误
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let sampling = SamplingConfig::default();
        let request = ChatRequest {
            messages,
            tools: &[],
            sampling: &sampling,
        };
        match self.chat(request).await? {
            LlmResponse::Text(text) => Ok(text),
            LlmResponse::ToolCalls { .. } => Err(LlmError::InvalidResponse(
                "unexpected tool call in plain completion".to_string(),
            )),
        }
    }

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

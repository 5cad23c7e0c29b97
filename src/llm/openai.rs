//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；支持 DeepSeek、OpenAI、自建代理等。
//! 请求体按 function-calling 协议直接构造 JSON（byot），以便无损携带 tool_calls / tool_call_id。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use async_openai::Client;
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::{ChatRequest, LlmClient, LlmError, LlmResponse};
use crate::memory::{Message, Role, ToolCallRequest};

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// OpenAI 兼容客户端：持有 Client 与 model 名
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            usage: TokenUsage::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_body(&self, request: &ChatRequest<'_>) -> Value {
        let messages: Vec<Value> = request.messages.iter().map(to_wire_message).collect();
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": request.sampling.temperature,
        });
        if let Some(max_tokens) = request.sampling.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if !request.tools.is_empty() {
            body["tools"] = Value::Array(request.tools.to_vec());
            body["tool_choice"] = json!("auto");
        }
        body
    }
}

/// 将内部 Message 转为 chat/completions 的消息 JSON
pub fn to_wire_message(m: &Message) -> Value {
    match m.role {
        Role::Assistant if m.has_tool_calls() => {
            let calls: Vec<Value> = m
                .tool_calls
                .iter()
                .map(|c| {
                    json!({
                        "id": c.id,
                        "type": "function",
                        "function": { "name": c.name, "arguments": c.arguments },
                    })
                })
                .collect();
            let content = if m.content.is_empty() {
                Value::Null
            } else {
                Value::String(m.content.clone())
            };
            json!({ "role": "assistant", "content": content, "tool_calls": calls })
        }
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": m.tool_call_id.clone().unwrap_or_default(),
            "content": m.content,
        }),
        role => json!({ "role": role.as_str(), "content": m.content }),
    }
}

/// 解析 chat/completions 响应：首个 choice 含 tool_calls 则为工具调用，否则为文本
pub fn parse_wire_response(response: &Value) -> Result<LlmResponse, LlmError> {
    let message = response
        .pointer("/choices/0/message")
        .ok_or_else(|| LlmError::InvalidResponse("missing choices[0].message".to_string()))?;
    let content = message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let calls = match message.get("tool_calls").and_then(Value::as_array) {
        Some(calls) if !calls.is_empty() => calls,
        _ => return Ok(LlmResponse::Text(content)),
    };

    let mut parsed = Vec::with_capacity(calls.len());
    for (idx, call) in calls.iter().enumerate() {
        let name = call
            .pointer("/function/name")
            .and_then(Value::as_str)
            .ok_or_else(|| LlmError::InvalidResponse(format!("tool_calls[{idx}] without name")))?;
        let id = call
            .get("id")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
        // 部分兼容端点把 arguments 返回为对象而非字符串
        let arguments = match call.pointer("/function/arguments") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => "{}".to_string(),
            Some(other) => other.to_string(),
        };
        parsed.push(ToolCallRequest::new(id, name, arguments));
    }
    Ok(LlmResponse::ToolCalls {
        content,
        calls: parsed,
    })
}

fn classify_error(message: String) -> LlmError {
    let lower = message.to_lowercase();
    if lower.contains("rate limit") || lower.contains("429") {
        LlmError::RateLimited { retry_after_ms: 0 }
    } else if lower.contains("timed out") || lower.contains("timeout") {
        LlmError::Timeout
    } else if lower.contains("connect") || lower.contains("dns") || lower.contains("reqwest") {
        LlmError::Network(message)
    } else {
        LlmError::Api(message)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn chat(&self, request: ChatRequest<'_>) -> Result<LlmResponse, LlmError> {
        let body = self.build_body(&request);
        let response: Value = self
            .client
            .chat()
            .create_byot(body)
            .await
            .map_err(|e| classify_error(e.to_string()))?;

        // 提取 token 使用统计
        if let Some(usage) = response.get("usage") {
            let prompt = usage.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0);
            let completion = usage
                .get("completion_tokens")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            self.usage.add(prompt, completion);
        }

        parse_wire_response(&response)
    }
}

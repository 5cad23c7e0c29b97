//! Mock LLM 客户端（用于测试与本地演示，无需 API）
//!
//! - MockLlmClient：首轮把最后一条 User 消息交给 echo 工具，拿到 Observation 后作为最终回复，便于本地跑通主循环。
//! - ScriptedLlmClient：按顺序回放预设响应并记录每次请求，供测试断言 transcript。

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{ChatRequest, LlmClient, LlmError, LlmResponse};
use crate::memory::{Message, Role};

/// Mock 客户端：回显用户最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn chat(&self, request: ChatRequest<'_>) -> Result<LlmResponse, LlmError> {
        let last = request.messages.last();
        if let Some(m) = last.filter(|m| m.role == Role::Tool) {
            let text = serde_json::from_str::<serde_json::Value>(&m.content)
                .ok()
                .and_then(|v| v.get("message").and_then(|s| s.as_str()).map(String::from))
                .unwrap_or_else(|| m.content.clone());
            return Ok(LlmResponse::Text(text));
        }

        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        let has_echo = request.tools.iter().any(|t| {
            t.pointer("/function/name").and_then(|n| n.as_str()) == Some("echo")
        });
        if !has_echo {
            return Ok(LlmResponse::Text(format!("Echo from Mock: {last_user}")));
        }

        let args = serde_json::json!({ "text": format!("Echo from Mock: {last_user}") });
        Ok(LlmResponse::tool_call(
            &format!("call_{}", uuid::Uuid::new_v4().simple()),
            "echo",
            &args.to_string(),
        ))
    }
}

/// 记录下来的一次模型请求
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
    pub temperature: f32,
}

/// 脚本化客户端：依次弹出预设响应；队列耗尽后重复 fallback（未设置则返回 InvalidResponse）
#[derive(Default)]
pub struct ScriptedLlmClient {
    script: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    fallback: Option<LlmResponse>,
    delay: Option<Duration>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedLlmClient {
    pub fn new(responses: Vec<Result<LlmResponse, LlmError>>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    /// 每次都返回同一响应（如一个永不结束的工具调用）
    pub fn always(response: LlmResponse) -> Self {
        Self {
            fallback: Some(response),
            ..Self::default()
        }
    }

    /// 脚本耗尽后重复返回的响应
    pub fn with_fallback(mut self, response: LlmResponse) -> Self {
        self.fallback = Some(response);
        self
    }

    /// 每次响应前等待，用于超时测试
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn chat(&self, request: ChatRequest<'_>) -> Result<LlmResponse, LlmError> {
        if let Ok(mut recorded) = self.requests.lock() {
            recorded.push(RecordedRequest {
                messages: request.messages.to_vec(),
                tool_names: request
                    .tools
                    .iter()
                    .filter_map(|t| t.pointer("/function/name").and_then(|n| n.as_str()))
                    .map(String::from)
                    .collect(),
                temperature: request.sampling.temperature,
            });
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(r) => r,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| LlmError::InvalidResponse("script exhausted".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::SamplingConfig;

    #[tokio::test]
    async fn test_scripted_replays_in_order_then_fails() {
        let client = ScriptedLlmClient::new(vec![
            Ok(LlmResponse::text("one")),
            Err(LlmError::Timeout),
        ]);
        let sampling = SamplingConfig::default();
        let req = ChatRequest {
            messages: &[],
            tools: &[],
            sampling: &sampling,
        };
        assert_eq!(client.chat(req).await.unwrap(), LlmResponse::text("one"));
        assert_eq!(client.chat(req).await, Err(LlmError::Timeout));
        assert!(client.chat(req).await.is_err());
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_echoes_through_tool() {
        let client = MockLlmClient;
        let sampling = SamplingConfig::default();
        let tools = vec![serde_json::json!({"type": "function", "function": {"name": "echo"}})];
        let messages = vec![Message::user("ping")];
        let first = client
            .chat(ChatRequest {
                messages: &messages,
                tools: &tools,
                sampling: &sampling,
            })
            .await
            .unwrap();
        assert!(matches!(first, LlmResponse::ToolCalls { ref calls, .. } if calls[0].name == "echo"));

        let messages = vec![
            Message::user("ping"),
            Message::tool("c1", r#"{"success":true,"message":"Echo from Mock: ping"}"#),
        ];
        let second = client
            .chat(ChatRequest {
                messages: &messages,
                tools: &tools,
                sampling: &sampling,
            })
            .await
            .unwrap();
        assert_eq!(second, LlmResponse::text("Echo from Mock: ping"));
    }
}

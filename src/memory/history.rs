//! 会话历史：按用户加载 / 保存 / 清空对话轮
//!
//! 最多保留最近 K 轮（system 轮不落盘），每次写入刷新滑动 TTL；
//! 存储不可用或数据损坏时 load 降级为空历史，而不是报错。

use std::sync::Arc;
use std::time::Duration;

use crate::core::AgentError;
use crate::memory::{truncate_to_recent, Message, Role, SessionStore};

/// 会话历史管理：封装 SessionStore 的 key 约定、截断与序列化
#[derive(Clone)]
pub struct ConversationHistory {
    store: Arc<dyn SessionStore>,
    max_turns: usize,
    ttl: Duration,
}

fn session_key(user_id: &str) -> String {
    format!("session:{user_id}")
}

impl ConversationHistory {
    pub fn new(store: Arc<dyn SessionStore>, max_turns: usize, ttl: Duration) -> Self {
        Self {
            store,
            max_turns: max_turns.max(1),
            ttl,
        }
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 读取用户历史；不存在、过期、存储不可用或反序列化失败时返回空
    pub async fn load(&self, user_id: &str) -> Vec<Message> {
        let raw = match self.store.get(&session_key(user_id)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(user_id = %user_id, "session load degraded to empty history: {}", e);
                return Vec::new();
            }
        };
        match serde_json::from_str::<Vec<Message>>(&raw) {
            Ok(mut turns) => {
                truncate_to_recent(&mut turns, self.max_turns);
                turns
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, "discarding unreadable session: {}", e);
                Vec::new()
            }
        }
    }

    /// 截断到最近 K 轮后写入，并刷新 TTL
    pub async fn save(&self, user_id: &str, turns: &[Message]) -> Result<(), AgentError> {
        let mut kept: Vec<Message> = turns
            .iter()
            .filter(|m| m.role != Role::System)
            .cloned()
            .collect();
        truncate_to_recent(&mut kept, self.max_turns);
        let raw = serde_json::to_string(&kept)
            .map_err(|e| AgentError::SessionStoreUnavailable(e.to_string()))?;
        self.store.set(&session_key(user_id), raw, self.ttl).await
    }

    pub async fn clear(&self, user_id: &str) -> Result<(), AgentError> {
        self.store.delete(&session_key(user_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemorySessionStore, ToolCallRequest};
    use async_trait::async_trait;

    fn history(k: usize) -> ConversationHistory {
        ConversationHistory::new(Arc::new(InMemorySessionStore::new()), k, Duration::from_secs(60))
    }

    struct DownStore;

    #[async_trait]
    impl SessionStore for DownStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, AgentError> {
            Err(AgentError::SessionStoreUnavailable("connection refused".into()))
        }
        async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), AgentError> {
            Err(AgentError::SessionStoreUnavailable("connection refused".into()))
        }
        async fn delete(&self, _key: &str) -> Result<(), AgentError> {
            Err(AgentError::SessionStoreUnavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_load_missing_user_is_empty() {
        assert!(history(5).load("nobody").await.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load_preserves_tool_calls() {
        let h = history(10);
        let turns = vec![
            Message::user("find X1"),
            Message::assistant_tool_calls(
                "",
                vec![ToolCallRequest::new("call_9", "lookup_item", r#"{"id":"X1"}"#)],
            ),
            Message::tool("call_9", r#"{"success":true}"#),
            Message::assistant("Found it"),
        ];
        h.save("u1", &turns).await.unwrap();
        assert_eq!(h.load("u1").await, turns);
    }

    #[tokio::test]
    async fn test_save_drops_system_and_truncates() {
        let h = history(3);
        let mut turns = vec![Message::system("rules")];
        turns.extend((0..6).map(|i| Message::user(format!("u{i}"))));
        h.save("u1", &turns).await.unwrap();
        let loaded = h.load("u1").await;
        assert_eq!(loaded.len(), 3);
        assert!(loaded.iter().all(|m| m.role != Role::System));
        assert_eq!(loaded[0].content, "u3");
    }

    #[tokio::test]
    async fn test_clear_empties_history() {
        let h = history(5);
        h.save("u1", &[Message::user("hi")]).await.unwrap();
        h.clear("u1").await.unwrap();
        assert!(h.load("u1").await.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_store_degrades_to_empty() {
        let h = ConversationHistory::new(Arc::new(DownStore), 5, Duration::from_secs(60));
        assert!(h.load("u1").await.is_empty());
        assert!(matches!(
            h.save("u1", &[Message::user("hi")]).await,
            Err(AgentError::SessionStoreUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_session_is_discarded() {
        let store = Arc::new(InMemorySessionStore::new());
        store
            .set("session:u1", "{not json".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        let h = ConversationHistory::new(store, 5, Duration::from_secs(60));
        assert!(h.load("u1").await.is_empty());
    }
}

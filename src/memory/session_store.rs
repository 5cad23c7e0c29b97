//! 会话存储抽象层
//!
//! 统一的键值接口（get / set / delete，带 TTL），支持内存和 SQLite 持久化两种实现。
//! 存储不可用时返回 SessionStoreUnavailable，由上层降级为空历史。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::RwLock;

use crate::core::AgentError;

/// Instant 无法表示的 TTL 按此上限处理
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// 会话存储接口：按 key 存取序列化后的会话，set 时刷新 TTL
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// 读取未过期的值；不存在或已过期返回 None
    async fn get(&self, key: &str) -> Result<Option<String>, AgentError>;

    /// 写入值并把过期时间重置为 now + ttl
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), AgentError>;

    async fn delete(&self, key: &str) -> Result<(), AgentError>;
}

struct Entry {
    value: String,
    expires_at: Instant,
}

/// 内存会话存储：进程内 HashMap，过期条目在读取时忽略，purge_expired 时清理
#[derive(Default)]
pub struct InMemorySessionStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 清理过期会话，返回清理条数
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AgentError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), AgentError> {
        let now = Instant::now();
        // 超大 TTL 无法表示时退化为约 100 年
        let expires_at = now
            .checked_add(ttl)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        let entry = Entry { value, expires_at };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AgentError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// SQLite 会话存储：rusqlite 同步连接，所有调用经 spawn_blocking 执行，避免阻塞运行时
pub struct SqliteSessionStore {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

fn unavailable(e: impl std::fmt::Display) -> AgentError {
    AgentError::SessionStoreUnavailable(e.to_string())
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// 绝对过期时间（毫秒）；超出 i64 时饱和
fn expiry_millis(now: i64, ttl: Duration) -> i64 {
    now.saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
}

impl SqliteSessionStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AgentError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(unavailable)?;
            }
        }
        let conn = Connection::open(&path).map_err(unavailable)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS sessions (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            )",
            [],
        )
        .map_err(unavailable)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn with_conn<F, R>(&self, f: F) -> Result<R, AgentError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| unavailable("sqlite connection poisoned"))?;
            f(&guard).map_err(unavailable)
        })
        .await
        .map_err(unavailable)?
    }

    /// 删除已过期的行，返回删除条数
    pub async fn purge_expired(&self) -> Result<usize, AgentError> {
        let now = now_millis();
        self.with_conn(move |c| c.execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now]))
            .await
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AgentError> {
        let key = key.to_string();
        let now = now_millis();
        self.with_conn(move |c| {
            c.query_row(
                "SELECT value FROM sessions WHERE key = ?1 AND expires_at > ?2",
                params![key, now],
                |row| row.get::<_, String>(0),
            )
            .optional()
        })
        .await
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), AgentError> {
        let key = key.to_string();
        let expires_at = expiry_millis(now_millis(), ttl);
        self.with_conn(move |c| {
            c.execute(
                "INSERT INTO sessions (key, value, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
                params![key, value, expires_at],
            )
            .map(|_| ())
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), AgentError> {
        let key = key.to_string();
        self.with_conn(move |c| c.execute("DELETE FROM sessions WHERE key = ?1", params![key]).map(|_| ()))
            .await
    }
}

/// 创建会话存储
///
/// 提供 sqlite_path 且能打开时使用 SQLite 持久化；否则回退到内存存储
pub fn create_session_store(sqlite_path: Option<&Path>) -> Arc<dyn SessionStore> {
    if let Some(path) = sqlite_path {
        match SqliteSessionStore::open(path) {
            Ok(store) => {
                tracing::info!("Using sqlite session store: {:?}", path);
                return Arc::new(store);
            }
            Err(e) => {
                tracing::warn!("Failed to open sqlite session store, falling back to memory: {}", e);
            }
        }
    }
    tracing::info!("Using in-memory session store");
    Arc::new(InMemorySessionStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_set_get_delete() {
        let store = InMemorySessionStore::new();
        store.set("session:u1", "[]".to_string(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("session:u1").await.unwrap().as_deref(), Some("[]"));
        store.delete("session:u1").await.unwrap();
        assert!(store.get("session:u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_expiry() {
        let store = InMemorySessionStore::new();
        store.set("k", "v".to_string(), Duration::from_millis(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(store.get("k").await.unwrap().is_none());
        assert_eq!(store.purge_expired().await, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_memory_store_set_refreshes_ttl() {
        let store = InMemorySessionStore::new();
        store.set("k", "v1".to_string(), Duration::from_millis(20)).await.unwrap();
        store.set("k", "v2".to_string(), Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_sqlite_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteSessionStore::open(dir.path().join("sessions.db")).unwrap();
        store.set("session:u1", "a".to_string(), Duration::from_secs(60)).await.unwrap();
        store.set("session:u1", "b".to_string(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("session:u1").await.unwrap().as_deref(), Some("b"));
        store.delete("session:u1").await.unwrap();
        assert!(store.get("session:u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_store_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteSessionStore::open(dir.path().join("sessions.db")).unwrap();
        store.set("k", "v".to_string(), Duration::from_millis(5)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(store.get("k").await.unwrap().is_none());
        assert_eq!(store.purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_accepts_huge_ttl() {
        let store = InMemorySessionStore::new();
        store.set("k", "v".to_string(), Duration::from_secs(u64::MAX)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.purge_expired().await, 0);
    }

    #[tokio::test]
    async fn test_sqlite_store_accepts_huge_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteSessionStore::open(dir.path().join("sessions.db")).unwrap();
        store.set("k", "v".to_string(), Duration::MAX).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_expiry_millis_saturates() {
        assert_eq!(expiry_millis(1_000, Duration::from_millis(500)), 1_500);
        assert_eq!(expiry_millis(1_000, Duration::MAX), i64::MAX);
        assert_eq!(expiry_millis(i64::MAX - 1, Duration::from_secs(10)), i64::MAX);
    }
}

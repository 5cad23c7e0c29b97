//! 记忆层：对话轮模型、会话存储（内存 / SQLite）、按用户的会话历史

pub mod conversation;
pub mod history;
pub mod session_store;

pub use conversation::{truncate_to_recent, Message, Role, ToolCallRequest};
pub use history::ConversationHistory;
pub use session_store::{
    create_session_store, InMemorySessionStore, SessionStore, SqliteSessionStore,
};

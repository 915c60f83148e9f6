//! 记忆层：模型消息、只追加的对话历史、历史持久化

pub mod history;
pub mod message;
pub mod persistence;

pub use history::{value_to_text, History, HistoryEntry, ToolExecutionResult};
pub use message::{Message, Role};
pub use persistence::HistoryPersistence;

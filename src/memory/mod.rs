//! 记忆层：只追加的对话日志与 JSON 持久化

pub mod conversation;
pub mod persistence;

pub use conversation::{Conversation, Message, Role, ToolCallRecord};
pub use persistence::JsonFile;

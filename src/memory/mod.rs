//! 记忆层：会话历史与基于字符数的截断

pub mod conversation;
pub mod truncate;

pub use conversation::{ConversationMemory, Message, Role};
pub use truncate::{estimate_tokens, truncate_memory, CHARS_PER_TOKEN};

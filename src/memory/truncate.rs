//! 记忆截断：按字符数估算 token，超预算时保留后一半消息
//!
//! 估算固定为 4 字符 ≈ 1 token，不可配置。

use crate::memory::Message;

/// 字符 / token 近似比
pub const CHARS_PER_TOKEN: usize = 4;

/// 消息总字符数（按 Unicode 字符计数）
pub fn total_chars(messages: &[Message]) -> usize {
    messages.iter().map(|m| m.content.chars().count()).sum()
}

/// 估算消息列表的 token 数，仅用于展示；截断判断直接比较字符数
pub fn estimate_tokens(messages: &[Message]) -> usize {
    total_chars(messages) / CHARS_PER_TOKEN
}

/// 总字符数超过 `max_tokens * 4` 时返回 `messages[len / 2..]`，否则原样返回；不修改输入
pub fn truncate_memory(messages: &[Message], max_tokens: usize) -> Vec<Message> {
    if total_chars(messages) > max_tokens.saturating_mul(CHARS_PER_TOKEN) {
        let mid = messages.len() / 2;
        messages[mid..].to_vec()
    } else {
        messages.to_vec()
    }
}

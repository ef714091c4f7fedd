//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Grok / 本地 / Mock）实现 LlmClient：complete（非流式）、complete_stream（流式 Token）。

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use thiserror::Error;

use crate::memory::Message;

/// 模型后端错误；反思循环内不做本地恢复，直接向上传播
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Stream error: {0}")]
    StreamError(String),

    /// 测试用脚本客户端的预设响应已用完
    #[error("No scripted response left")]
    Exhausted,
}

/// 流式 Token：惰性、有限、不可重启
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// LLM 客户端 trait：非流式完成与流式完成（返回 Token 流）
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// 流式完成，返回 Token 流
    async fn complete_stream(&self, messages: &[Message]) -> Result<TokenStream, LlmError>;

    /// 后端标识，用于日志
    fn model_name(&self) -> &str {
        "unknown"
    }

    /// 丢弃已缓存的响应；无缓存的后端什么也不做
    fn clear_cache(&self) {}
}

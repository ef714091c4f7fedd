//! Mock LLM 客户端（用于测试与无 API Key 时的本地运行）
//!
//! - MockLlmClient：回显最后一条 User 消息
//! - ScriptedLlmClient：按顺序返回预设响应，并记录每次收到的 prompt，便于断言调用次数

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream;

use crate::llm::{LlmClient, LlmError, TokenStream};
use crate::memory::{Message, Role};

/// 把完整文本切成带空白的小段，模拟逐 token 输出
fn split_tokens(content: &str) -> Vec<Result<String, LlmError>> {
    content
        .split_inclusive(' ')
        .map(|s| Ok(s.to_string()))
        .collect()
}

/// Mock 客户端：回显用户最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        Ok(format!("Echo from Mock: {}", last_user))
    }

    async fn complete_stream(&self, messages: &[Message]) -> Result<TokenStream, LlmError> {
        let content = self.complete(messages).await?;
        Ok(Box::pin(stream::iter(split_tokens(&content))))
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

/// 脚本客户端：每次调用（流式或非流式）消费一条预设响应
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlmClient {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(|s| Ok(s.into())).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// 追加一条失败响应
    pub fn then_fail(self, err: LlmError) -> Self {
        if let Ok(mut q) = self.responses.lock() {
            q.push_back(Err(err));
        }
        self
    }

    /// 已发生的调用次数
    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// 每次调用收到的消息
    pub fn prompts(&self) -> Vec<Vec<Message>> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn next_response(&self, messages: &[Message]) -> Result<String, LlmError> {
        if let Ok(mut p) = self.prompts.lock() {
            p.push(messages.to_vec());
        }
        self.responses
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or(Err(LlmError::Exhausted))
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.next_response(messages)
    }

    async fn complete_stream(&self, messages: &[Message]) -> Result<TokenStream, LlmError> {
        let content = self.next_response(messages)?;
        Ok(Box::pin(stream::iter(split_tokens(&content))))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_mock_echoes_last_user() {
        let out = MockLlmClient
            .complete(&[Message::user("first"), Message::assistant("x"), Message::user("second")])
            .await
            .unwrap();
        assert_eq!(out, "Echo from Mock: second");
    }

    #[tokio::test]
    async fn test_scripted_stream_concatenates() {
        let llm = ScriptedLlmClient::new(["hello there world"]);
        let tokens: Vec<String> = llm
            .complete_stream(&[Message::user("q")])
            .await
            .unwrap()
            .map(|t| t.unwrap())
            .collect()
            .await;
        assert!(tokens.len() > 1);
        assert_eq!(tokens.concat(), "hello there world");
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_scripted_exhausted_and_fail() {
        let llm = ScriptedLlmClient::new(["ok"]).then_fail(LlmError::ApiError("boom".into()));
        assert_eq!(llm.complete(&[]).await.unwrap(), "ok");
        assert_eq!(llm.complete(&[]).await, Err(LlmError::ApiError("boom".into())));
        assert_eq!(llm.complete(&[]).await, Err(LlmError::Exhausted));
        assert_eq!(llm.calls(), 3);
    }
}

//! Critic：对最新草稿做一次轻量 LLM 评审
//!
//! 评审文本原样返回，是否满意由状态机判断。

use std::sync::Arc;

use crate::llm::{LlmClient, LlmError};
use crate::memory::Message;
use crate::reflection::prompts::critique_prompt;
use crate::reflection::state::is_satisfactory;

/// 评审结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CriticResult {
    Satisfactory(String),
    /// 需要修正，附评审意见
    Correction(String),
}

impl CriticResult {
    pub fn from_feedback(feedback: String) -> Self {
        if is_satisfactory(&feedback) {
            CriticResult::Satisfactory(feedback)
        } else {
            CriticResult::Correction(feedback)
        }
    }

    pub fn feedback(&self) -> &str {
        match self {
            CriticResult::Satisfactory(s) | CriticResult::Correction(s) => s,
        }
    }

    pub fn into_feedback(self) -> String {
        match self {
            CriticResult::Satisfactory(s) | CriticResult::Correction(s) => s,
        }
    }

    pub fn is_satisfactory(&self) -> bool {
        matches!(self, CriticResult::Satisfactory(_))
    }
}

/// Critic：持有评审用 LLM
#[derive(Clone)]
pub struct Critic {
    llm: Arc<dyn LlmClient>,
}

impl Critic {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn evaluate(&self, response: &str) -> Result<CriticResult, LlmError> {
        let feedback = self.llm.complete(&[Message::user(critique_prompt(response))]).await?;
        Ok(CriticResult::from_feedback(feedback))
    }
}

//! 反思循环状态机：Generate → Critique →（Generate | Done）
//!
//! 状态迁移是纯函数，只读 ConversationState 与迭代上限，便于单独测试终止条件。
//! 上限只在 Critique 之后检查，因此无论 max_iterations 为多少，至少执行一轮生成 + 批评。

use serde::Serialize;

use crate::memory::Message;

/// 批评意见中表示「满意」的标记（不区分大小写）
pub const SATISFACTORY_MARKER: &str = "satisfactory";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Generate,
    Critique,
    Done,
}

/// 单次运行的会话状态；每次运行新建，只由循环步骤修改，结束即丢弃
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    pub context: String,
    pub iteration: usize,
    pub feedback: Option<String>,
}

impl ConversationState {
    pub fn new(context: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            messages,
            context: context.into(),
            iteration: 0,
            feedback: None,
        }
    }

    /// Generate 步骤的结果：追加助手消息，迭代数 +1
    pub fn with_generation(mut self, response: impl Into<String>) -> Self {
        self.messages.push(Message::assistant(response));
        self.iteration += 1;
        self
    }

    /// Critique 步骤的结果：记录批评意见，迭代数不变
    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Some(feedback.into());
        self
    }

    /// 最近一条助手消息（即当前草稿）
    pub fn last_assistant(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == crate::memory::Role::Assistant)
            .map(|m| m.content.as_str())
    }

    pub fn is_satisfactory(&self) -> bool {
        self.feedback.as_deref().is_some_and(is_satisfactory)
    }
}

pub fn is_satisfactory(feedback: &str) -> bool {
    feedback.to_lowercase().contains(SATISFACTORY_MARKER)
}

/// 状态迁移
pub fn next_step(step: Step, state: &ConversationState, max_iterations: usize) -> Step {
    match step {
        Step::Generate => Step::Critique,
        Step::Critique => {
            if !state.is_satisfactory() && state.iteration < max_iterations {
                Step::Generate
            } else {
                Step::Done
            }
        }
        Step::Done => Step::Done,
    }
}

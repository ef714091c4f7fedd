//! 状态定义：UiState 投影
//!
//! UI 只持有轻量的 UiState（阶段、历史、流式草稿、提示、锁、错误）；会话内部状态由 ChatSession 维护并投影到 UiState。

use serde::Serialize;

use crate::memory::Message;

/// UI 看到的「投影」状态，轻量且易于渲染
#[derive(Clone, Debug, Default, Serialize)]
pub struct UiState {
    pub phase: AgentPhase,
    pub history: Vec<Message>,
    /// 正在流式输出的草稿（每次重新生成时清空）
    pub streaming: String,
    pub iteration: usize,
    pub max_iterations: usize,
    /// 本轮的提示信息（抓取进度、抓取失败、评审意见等）
    pub notices: Vec<Notice>,
    pub input_locked: bool,
    pub error_message: Option<String>,
}

/// 会话阶段（UI 投影用）
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub enum AgentPhase {
    #[default]
    Idle,
    Fetching,
    Searching,
    Generating,
    Critiquing,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

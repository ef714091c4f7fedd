//! 反思循环事件：用于流式展示草稿、批评与最终结果

use serde::Serialize;

/// 单步过程事件（可序列化为 JSON）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReflectionEvent {
    /// 开始生成第 iteration 份草稿（从 1 开始）
    DraftStarted { iteration: usize, max_iterations: usize },
    /// 草稿的一小段（流式输出）
    Token { text: String },
    /// 草稿生成完毕
    DraftDone { iteration: usize, text: String },
    /// 正在评审
    Critiquing { iteration: usize },
    /// 评审意见
    Critique {
        iteration: usize,
        feedback: String,
        satisfactory: bool,
    },
    /// 循环结束。response 为最后一份草稿，即最后一个 DraftStarted 之后所有 Token 的拼接；
    /// 更早的草稿与评审文本不计入提交的回复
    Done { response: String, iterations: usize },
}

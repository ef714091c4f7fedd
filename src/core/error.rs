//! 会话级错误类型
//!
//! URL 抓取错误按 URL 转成提示、不中断本轮；模型与搜索后端错误中断本轮，且不提交任何助手消息；用户取消不是错误，见 TurnOutcome。

use thiserror::Error;

use crate::llm::LlmError;
use crate::tools::SearchError;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Model call failed: {0}")]
    ModelCall(#[from] LlmError),

    #[error("Search failed: {0}")]
    Search(#[from] SearchError),
}

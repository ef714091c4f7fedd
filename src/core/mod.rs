//! 核心编排层：错误、状态投影、会话（一轮对话流程）、主控循环

pub mod error;
pub mod orchestrator;
pub mod session;
pub mod state;

pub use error::AgentError;
pub use orchestrator::{create_agent, run_session, Command};
pub use session::{ChatSession, TurnOutcome};
pub use state::{AgentPhase, Notice, NoticeLevel, UiState};

//! 认知层：反思循环（生成 → 批评 → 重新生成）、Critic、状态机与事件

pub mod critic;
pub mod events;
pub mod loop_;
pub mod prompts;
pub mod state;

pub use critic::{Critic, CriticResult};
pub use events::ReflectionEvent;
pub use loop_::{ReflectionLoop, ReflectionOutcome, ReflectionStream};
pub use state::{next_step, ConversationState, Step, SATISFACTORY_MARKER};

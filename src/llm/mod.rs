//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Grok / 本地 / Mock）与响应缓存

pub mod cache;
pub mod mock;
pub mod openai;
pub mod providers;
pub mod traits;

pub use cache::{cache_key, CachedLlmClient, ResponseCache};
pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::{OpenAiClient, SamplingParams};
pub use providers::{create_llm_from_config, ModelType};
pub use traits::{LlmClient, LlmError, TokenStream};

//! 按配置选择模型后端
//!
//! - `grok`: xAI 的 OpenAI 兼容端点，密钥取自 `api_key_var` 指定的环境变量
//! - `local`: `endpoint` 指向的本地服务（LM Studio 等），使用占位密钥
//! - 其他：OpenAI，密钥取自 `OPENAI_API_KEY`
//!
//! 缺少密钥时回退到 Mock（回显）客户端并告警。

use std::sync::Arc;

use crate::config::AppConfig;
use crate::llm::{CachedLlmClient, LlmClient, MockLlmClient, OpenAiClient, ResponseCache, SamplingParams};

pub const XAI_BASE_URL: &str = "https://api.x.ai/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_LOCAL_ENDPOINT: &str = "http://localhost:1234/v1";
/// 本地服务不校验密钥，但 API 要求非空
pub const LOCAL_DUMMY_KEY: &str = "lm-studio";

/// 模型后端类型（由 `model_type` 解析，未知值视为 OpenAI）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    Grok,
    Local,
    OpenAi,
}

impl ModelType {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "grok" => ModelType::Grok,
            "local" => ModelType::Local,
            _ => ModelType::OpenAi,
        }
    }
}

fn env_key(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|k| !k.trim().is_empty())
}

/// 采样参数；超出 u32 的 max_tokens 取 u32::MAX
fn sampling_params(cfg: &AppConfig) -> SamplingParams {
    SamplingParams {
        temperature: cfg.temperature,
        max_tokens: u32::try_from(cfg.max_tokens).unwrap_or(u32::MAX),
    }
}

/// 根据配置创建底层客户端（不含缓存）
pub fn create_base_client(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let params = sampling_params(cfg);

    match ModelType::parse(&cfg.model_type) {
        ModelType::Grok => match env_key(&cfg.api_key_var) {
            Some(key) => {
                tracing::info!(model = %cfg.model_name, "Using Grok LLM");
                Arc::new(OpenAiClient::new(Some(XAI_BASE_URL), &cfg.model_name, &key, params))
            }
            None => {
                tracing::warn!(var = %cfg.api_key_var, "Grok API key not set, using Mock LLM");
                Arc::new(MockLlmClient)
            }
        },
        ModelType::Local => {
            let endpoint = cfg.endpoint.as_deref().unwrap_or(DEFAULT_LOCAL_ENDPOINT);
            tracing::info!(endpoint = %endpoint, model = %cfg.model_name, "Using local LLM");
            Arc::new(OpenAiClient::new(Some(endpoint), &cfg.model_name, LOCAL_DUMMY_KEY, params))
        }
        ModelType::OpenAi => match env_key("OPENAI_API_KEY") {
            Some(key) => {
                let model = if cfg.model_name.trim().is_empty() {
                    DEFAULT_OPENAI_MODEL
                } else {
                    cfg.model_name.as_str()
                };
                tracing::info!(model = %model, "Using OpenAI LLM");
                Arc::new(OpenAiClient::new(None, model, &key, params))
            }
            None => {
                tracing::warn!("OPENAI_API_KEY not set, using Mock LLM");
                Arc::new(MockLlmClient)
            }
        },
    }
}

/// 创建完整客户端：按 `cache_responses` 决定是否包一层响应缓存
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let base = create_base_client(cfg);
    if !cfg.cache_responses {
        return base;
    }
    let capacity = (cfg.cache_capacity > 0).then_some(cfg.cache_capacity);
    Arc::new(CachedLlmClient::new(base, Arc::new(ResponseCache::new(capacity))))
}

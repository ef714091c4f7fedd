//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `REFLECTOR__*` 覆盖（如 `REFLECTOR__MAX_ITERATIONS=5`）。
//! 进程启动时加载一次，之后只读。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层键）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 后端：grok / local / 其他（OpenAI 兼容）
    pub model_type: String,
    pub model_name: String,
    /// 保存 API Key 的环境变量名（grok 使用）
    pub api_key_var: String,
    pub temperature: f32,
    /// 单次生成上限，同时作为会话历史截断的 token 预算
    pub max_tokens: usize,
    /// 反思循环最大迭代次数（至少执行一轮）
    pub max_iterations: usize,
    pub search_results_limit: usize,
    /// local 模式的 OpenAI 兼容端点
    pub endpoint: Option<String>,
    /// reasoned search 的 prompt 版本，未知值回退到默认版本
    pub prompt_version: String,
    /// URL 抓取内容最大字符数
    pub fetch_max_chars: usize,
    pub fetch_timeout_secs: u64,
    /// 进入反思循环前先让模型判断是否需要搜索
    pub auto_search: bool,
    pub cache_responses: bool,
    /// 响应缓存容量，0 表示不淘汰
    pub cache_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_type: "openai".to_string(),
            model_name: "gpt-4o-mini".to_string(),
            api_key_var: "XAI_API_KEY".to_string(),
            temperature: 0.7,
            max_tokens: 2048,
            max_iterations: 3,
            search_results_limit: 5,
            endpoint: None,
            prompt_version: crate::tools::search::DEFAULT_PROMPT_VERSION.to_string(),
            fetch_max_chars: crate::tools::fetch::DEFAULT_MAX_CONTENT_CHARS,
            fetch_timeout_secs: 15,
            auto_search: false,
            cache_responses: true,
            cache_capacity: 128,
        }
    }
}

/// 从 config 目录加载配置，环境变量 REFLECTOR__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 REFLECTOR__*
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        } else {
            tracing::warn!(path = %path.display(), "config file not found, ignored");
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("REFLECTOR")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

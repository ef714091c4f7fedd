//! 搜索客户端
//!
//! - `search(query)`：调用外部搜索提供方（默认 DuckDuckGo Instant Answer API），结果条数受配置限制，原样返回文本
//! - `reasoned_search(context)`：先让 LLM 判断是否需要搜索；回复含 "search" 时取最后一个 `query:` 之后的文本作为查询词
//!
//! 搜索 prompt 带版本号，按配置键查找，未知键静默回退到默认版本。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::llm::{LlmClient, LlmError};
use crate::memory::Message;
use crate::tools::Tool;

pub const DEFAULT_PROMPT_VERSION: &str = "v2";
pub const NO_SEARCH_NEEDED: &str = "No search needed.";
const QUERY_MARKER: &str = "query:";
const DUCKDUCKGO_API: &str = "https://api.duckduckgo.com/";
const NO_RESULTS: &str = "No good search result was found";

/// 版本化的 reasoned search prompt（`{context}` 为占位符）
pub const SEARCH_PROMPTS: &[(&str, &str)] = &[
    (
        "v1",
        "Determine if a web search is needed based on the context. If yes, generate a search query.\n\nContext: {context}",
    ),
    (
        "v2",
        "Based on the context, determine if a web search is needed. If yes, generate a search query and perform it.\n\nContext: {context}",
    ),
];

/// 按版本键查找 prompt，未知键回退到默认版本
pub fn search_prompt(version: &str) -> &'static str {
    let lookup = |v: &str| SEARCH_PROMPTS.iter().find(|(k, _)| *k == v).map(|(_, p)| *p);
    lookup(version)
        .or_else(|| lookup(DEFAULT_PROMPT_VERSION))
        .unwrap_or_default()
}

/// 从模型回复中提取查询词：最后一个 `query:` 之后的部分（没有标记时取整段），去首尾空白
pub fn extract_query(response: &str) -> &str {
    response.rsplit(QUERY_MARKER).next().unwrap_or(response).trim()
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Search request failed: {0}")]
    Request(String),

    #[error("Search response invalid: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// 外部搜索提供方
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<String, SearchError>;
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct InstantAnswer {
    heading: String,
    abstract_text: String,
    #[serde(rename = "AbstractURL")]
    abstract_url: String,
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct RelatedTopic {
    text: Option<String>,
    #[serde(rename = "FirstURL")]
    first_url: Option<String>,
    /// 分组条目（如 "See also"）下的子条目
    topics: Vec<RelatedTopic>,
}

impl RelatedTopic {
    fn flatten_into<'a>(&'a self, out: &mut Vec<&'a RelatedTopic>) {
        if self.text.is_some() {
            out.push(self);
        }
        for t in &self.topics {
            t.flatten_into(out);
        }
    }
}

impl InstantAnswer {
    fn render(&self, max_results: usize) -> String {
        let mut lines = Vec::new();
        if !self.abstract_text.is_empty() {
            lines.push(format!("{}: {} ({})", self.heading, self.abstract_text, self.abstract_url));
        }
        let mut topics = Vec::new();
        for t in &self.related_topics {
            t.flatten_into(&mut topics);
        }
        for t in topics {
            if lines.len() >= max_results {
                break;
            }
            let text = t.text.as_deref().unwrap_or_default();
            match t.first_url.as_deref() {
                Some(url) if !url.is_empty() => lines.push(format!("{} ({})", text, url)),
                _ => lines.push(text.to_string()),
            }
        }
        lines.truncate(max_results);
        if lines.is_empty() {
            NO_RESULTS.to_string()
        } else {
            lines.join("\n")
        }
    }
}

/// DuckDuckGo Instant Answer API（无需 API Key）
pub struct DuckDuckGoProvider {
    client: Client,
    endpoint: String,
}

impl DuckDuckGoProvider {
    pub fn new(timeout_secs: u64) -> Self {
        Self::with_endpoint(DUCKDUCKGO_API, timeout_secs)
    }

    pub fn with_endpoint(endpoint: impl Into<String>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, timeout_secs, "search http client build failed, using defaults without timeout");
                Client::new()
            });
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoProvider {
    async fn search(&self, query: &str, max_results: usize) -> Result<String, SearchError> {
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("format", "json"), ("no_html", "1"), ("skip_disambig", "1")])
            .send()
            .await
            .map_err(|e| SearchError::Request(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(SearchError::Request(format!("HTTP {}", resp.status())));
        }
        let answer: InstantAnswer = resp
            .json()
            .await
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;
        Ok(answer.render(max_results))
    }
}

/// 搜索客户端：提供方 + 判断是否需要搜索的 LLM
pub struct SearchClient {
    provider: Arc<dyn SearchProvider>,
    llm: Arc<dyn LlmClient>,
    prompt: &'static str,
    results_limit: usize,
}

impl SearchClient {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        llm: Arc<dyn LlmClient>,
        prompt_version: &str,
        results_limit: usize,
    ) -> Self {
        Self {
            provider,
            llm,
            prompt: search_prompt(prompt_version),
            results_limit,
        }
    }

    /// 直接搜索，结果原样返回
    pub async fn search(&self, query: &str) -> Result<String, SearchError> {
        tracing::info!(query = %query, limit = self.results_limit, "search");
        self.provider.search(query, self.results_limit).await
    }

    /// 让模型判断是否需要搜索，需要时提取查询词并搜索
    pub async fn reasoned_search(&self, context: &str) -> Result<String, SearchError> {
        let prompt = self.prompt.replace("{context}", context);
        let response = self.llm.complete(&[Message::user(prompt)]).await?;
        if response.to_lowercase().contains("search") {
            let query = extract_query(&response);
            self.search(query).await
        } else {
            tracing::debug!("model decided no search is needed");
            Ok(NO_SEARCH_NEEDED.to_string())
        }
    }
}

#[async_trait]
impl Tool for SearchClient {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search the web and return text results. Args: {\"query\": \"...\"}."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": { "query": { "type": "string" } },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let query = args.get("query").and_then(|v| v.as_str()).unwrap_or("").trim();
        if query.is_empty() {
            return Err("Missing query".to_string());
        }
        self.search(query).await.map_err(|e| e.to_string())
    }
}

//! URL 抓取：单次 GET、超时、内容大小上限
//!
//! 非 http/https 输入直接拒绝（不发起网络请求）；HTML 响应用 html2text 提取可读文本；
//! 超过上限时截断并追加 `... (truncated)`。不重试，不缓存。

use std::time::Duration;

use async_trait::async_trait;
use html2text::from_read;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

use crate::tools::Tool;

/// 默认内容上限（字符）
pub const DEFAULT_MAX_CONTENT_CHARS: usize = 10240;
/// 截断标记
pub const TRUNCATION_MARKER: &str = "... (truncated)";

/// 抓取错误；Display 文本直接展示给用户
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Invalid URL")]
    InvalidUrl,

    #[error("Request timed out")]
    Timeout,

    #[error("Fetch failed: {0}")]
    Failed(String),
}

impl FetchError {
    /// 超时属于可恢复的瞬时错误（UI 以警告展示）
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Timeout)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Failed(e.to_string())
        }
    }
}

/// 简易去除 HTML 标签（html2text 失败时的回退）
fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 判断内容是否像 HTML（需提取可读文本）
fn looks_like_html(s: &str) -> bool {
    let s = s.trim_start();
    s.starts_with("<!")
        || s.to_ascii_lowercase().starts_with("<html")
        || (s.contains('<') && (s.contains("</") || s.contains("<meta") || s.contains("<head")))
}

/// 提取主体文本：HTML 转纯文本，其他内容原样返回
pub fn extract_text(body: &str) -> String {
    let body = body.strip_prefix('\u{FEFF}').unwrap_or(body);
    if !looks_like_html(body) {
        return body.to_string();
    }
    match from_read(body.as_bytes(), 120) {
        Ok(text) if !text.trim().is_empty() => text,
        _ => strip_html_tags(body),
    }
}

/// 按字符截断并追加标记
pub fn cap_content(content: String, max_chars: usize) -> String {
    if content.chars().count() > max_chars {
        let head: String = content.chars().take(max_chars).collect();
        head + TRUNCATION_MARKER
    } else {
        content
    }
}

/// 是否为 http(s) URL（仅检查前缀）
pub fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// URL 抓取器：持有带超时的 reqwest Client 与内容上限
pub struct WebFetcher {
    client: Client,
    max_content_chars: usize,
}

impl WebFetcher {
    pub fn new(timeout_secs: u64, max_content_chars: usize) -> Self {
        const USER_AGENT: &str = concat!("reflector/", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, timeout_secs, "http client build failed, using defaults without timeout");
                Client::new()
            });
        Self {
            client,
            max_content_chars,
        }
    }

    /// 抓取 URL 并返回（可能被截断的）文本
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        if !is_http_url(url) {
            return Err(FetchError::InvalidUrl);
        }
        tracing::info!(url = %url, "fetching url");

        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Failed(format!("HTTP {}", status)));
        }
        let body = resp.text().await?;

        let content = cap_content(extract_text(&body), self.max_content_chars);
        tracing::debug!(url = %url, chars = content.chars().count(), "fetched url");
        Ok(content)
    }
}

impl Default for WebFetcher {
    fn default() -> Self {
        Self::new(15, DEFAULT_MAX_CONTENT_CHARS)
    }
}

#[async_trait]
impl Tool for WebFetcher {
    fn name(&self) -> &str {
        "fetch"
    }

    fn description(&self) -> &str {
        "Fetch readable text from an http(s) URL. Args: {\"url\": \"https://...\"}."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": { "url": { "type": "string" } },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let url = args.get("url").and_then(|v| v.as_str()).unwrap_or("").trim();
        self.fetch(url).await.map_err(|e| e.to_string())
    }
}

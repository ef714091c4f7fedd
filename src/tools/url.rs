//! 从用户输入中识别 URL（`https?://\S+`，按出现顺序）

use std::sync::OnceLock;

use regex::Regex;

static URL_PATTERN: OnceLock<Regex> = OnceLock::new();

fn url_pattern() -> &'static Regex {
    URL_PATTERN.get_or_init(|| Regex::new(r"https?://\S+").expect("valid URL regex"))
}

/// 返回文本中所有匹配 `https?://\S+` 的子串
pub fn detect_urls(text: &str) -> Vec<String> {
    url_pattern()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

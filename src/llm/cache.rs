//! 模型响应缓存：显式注入、显式键、显式淘汰
//!
//! 键为渲染后 prompt（角色 + 内容）的 SHA-256；容量为 None 时不淘汰，否则按插入顺序（FIFO）淘汰最旧项。
//! 流式调用命中缓存时一次性输出整段文本；未命中时边转发边累积，流正常结束后才写入缓存。

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use sha2::{Digest, Sha256};

use crate::llm::{LlmClient, LlmError, TokenStream};
use crate::memory::Message;

/// prompt 哈希键
pub fn cache_key(messages: &[Message]) -> String {
    let mut hasher = Sha256::new();
    for m in messages {
        hasher.update(m.role.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(m.content.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, String>,
    order: VecDeque<String>,
}

/// 内存响应缓存（可跨多个客户端共享）
#[derive(Debug, Default)]
pub struct ResponseCache {
    inner: Mutex<CacheInner>,
    capacity: Option<usize>,
}

impl ResponseCache {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            capacity,
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.lock().ok()?.entries.get(key).cloned()
    }

    pub fn insert(&self, key: String, value: String) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        if inner.entries.insert(key.clone(), value).is_none() {
            inner.order.push_back(key);
        }
        if let Some(cap) = self.capacity {
            while inner.order.len() > cap {
                if let Some(oldest) = inner.order.pop_front() {
                    inner.entries.remove(&oldest);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.entries.clear();
            inner.order.clear();
        }
    }
}

/// 带缓存的客户端包装
pub struct CachedLlmClient {
    inner: Arc<dyn LlmClient>,
    cache: Arc<ResponseCache>,
}

impl CachedLlmClient {
    pub fn new(inner: Arc<dyn LlmClient>, cache: Arc<ResponseCache>) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }
}

#[async_trait]
impl LlmClient for CachedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let key = cache_key(messages);
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(key = %&key[..12], "llm cache hit");
            return Ok(hit);
        }
        let out = self.inner.complete(messages).await?;
        self.cache.insert(key, out.clone());
        Ok(out)
    }

    async fn complete_stream(&self, messages: &[Message]) -> Result<TokenStream, LlmError> {
        let key = cache_key(messages);
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(key = %&key[..12], "llm cache hit (stream)");
            return Ok(Box::pin(stream::iter(vec![Ok(hit)])));
        }

        let mut upstream = self.inner.complete_stream(messages).await?;
        let cache = self.cache.clone();
        let tokens = async_stream::stream! {
            let mut full = String::new();
            while let Some(token) = upstream.next().await {
                match token {
                    Ok(t) => {
                        full.push_str(&t);
                        yield Ok(t);
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
            cache.insert(key, full);
        };
        Ok(Box::pin(tokens))
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn clear_cache(&self) {
        tracing::debug!(entries = self.cache.len(), "llm cache cleared");
        self.cache.clear();
        self.inner.clear_cache();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;

    #[test]
    fn test_key_depends_on_role_and_content() {
        let a = cache_key(&[Message::user("hi")]);
        let b = cache_key(&[Message::assistant("hi")]);
        let c = cache_key(&[Message::user("hi")]);
        assert_ne!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_fifo_eviction() {
        let cache = ResponseCache::new(Some(2));
        cache.insert("a".into(), "1".into());
        cache.insert("b".into(), "2".into());
        cache.insert("c".into(), "3".into());
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("c").as_deref(), Some("3"));
    }

    #[test]
    fn test_unbounded_keeps_everything() {
        let cache = ResponseCache::new(None);
        for i in 0..500 {
            cache.insert(i.to_string(), i.to_string());
        }
        assert_eq!(cache.len(), 500);
    }

    #[tokio::test]
    async fn test_complete_hits_cache() {
        let inner = Arc::new(ScriptedLlmClient::new(["first"]));
        let client = CachedLlmClient::new(inner.clone(), Arc::new(ResponseCache::new(None)));
        let prompt = [Message::user("q")];
        assert_eq!(client.complete(&prompt).await.unwrap(), "first");
        assert_eq!(client.complete(&prompt).await.unwrap(), "first");
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test]
    async fn test_stream_populates_cache_after_completion() {
        let inner = Arc::new(ScriptedLlmClient::new(["a streamed answer"]));
        let client = CachedLlmClient::new(inner.clone(), Arc::new(ResponseCache::new(None)));
        let prompt = [Message::user("q")];

        let first: Vec<_> = client.complete_stream(&prompt).await.unwrap().collect().await;
        let text: String = first.into_iter().map(|t| t.unwrap()).collect();
        assert_eq!(text, "a streamed answer");

        let second: Vec<_> = client.complete_stream(&prompt).await.unwrap().collect().await;
        assert_eq!(second, vec![Ok("a streamed answer".to_string())]);
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_call_is_not_cached() {
        let inner = Arc::new(
            ScriptedLlmClient::new(Vec::<String>::new()).then_fail(LlmError::ApiError("down".into())),
        );
        let client = CachedLlmClient::new(inner, Arc::new(ResponseCache::new(None)));
        assert!(client.complete(&[Message::user("q")]).await.is_err());
        assert!(client.cache().is_empty());
    }

    #[tokio::test]
    async fn test_clear_cache_forces_fresh_call() {
        let inner = Arc::new(ScriptedLlmClient::new(["old", "new"]));
        let client = CachedLlmClient::new(inner.clone(), Arc::new(ResponseCache::new(None)));
        let prompt = [Message::user("q")];
        assert_eq!(client.complete(&prompt).await.unwrap(), "old");

        client.clear_cache();
        assert!(client.cache().is_empty());
        assert_eq!(client.complete(&prompt).await.unwrap(), "new");
        assert_eq!(inner.calls(), 2);
    }
}

//! 反思对话集成测试：URL 抓取 + 反思循环 + 响应缓存

use std::sync::Arc;

use async_trait::async_trait;
use reflector::config::AppConfig;
use reflector::core::{AgentPhase, ChatSession, NoticeLevel, TurnOutcome, UiState};
use reflector::llm::{CachedLlmClient, LlmClient, ResponseCache, ScriptedLlmClient};
use reflector::memory::Message;
use reflector::reflection::ReflectionLoop;
use reflector::tools::{SearchError, SearchProvider, TRUNCATION_MARKER};
use tokio::sync::{mpsc, watch};

struct StaticProvider;

#[async_trait]
impl SearchProvider for StaticProvider {
    async fn search(&self, query: &str, max_results: usize) -> Result<String, SearchError> {
        Ok(format!("{max_results} results for {query}"))
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        max_iterations: 3,
        cache_responses: false,
        fetch_timeout_secs: 5,
        ..AppConfig::default()
    }
}

fn session(llm: Arc<dyn LlmClient>, cfg: AppConfig) -> (ChatSession, watch::Receiver<UiState>) {
    let (tx, rx) = watch::channel(UiState::default());
    (ChatSession::with_components(cfg, llm, Arc::new(StaticProvider), tx), rx)
}

#[tokio::test]
async fn test_fetched_page_feeds_generation() {
    let mut server = mockito::Server::new_async().await;
    let page = server
        .mock("GET", "/rust")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html><body><h1>Ownership</h1><p>Each value has one owner.</p></body></html>")
        .create_async()
        .await;

    let llm = Arc::new(ScriptedLlmClient::new([
        "Rust values have a single owner.",
        "Too short, mention borrowing.",
        "Rust values have a single owner; borrowing lends access.",
        "This is satisfactory.",
    ]));
    let (mut s, rx) = session(llm.clone(), test_config());
    let (_tx, mut cmds) = mpsc::unbounded_channel();

    let url = format!("{}/rust", server.url());
    let outcome = s.submit(&format!("Explain {url}"), &mut cmds).await;
    page.assert_async().await;

    assert_eq!(
        outcome,
        TurnOutcome::Completed("Rust values have a single owner; borrowing lends access.".into())
    );
    let first_prompt = &llm.prompts()[0][0].content;
    assert!(first_prompt.contains(&format!("Fetched from {url}:")));
    assert!(first_prompt.contains("Each value has one owner."));
    // 历史只保存用户原文，不包含抓取内容
    assert_eq!(s.history()[0], Message::user(format!("Explain {url}")));
    assert_eq!(s.history().len(), 2);

    let ui = rx.borrow().clone();
    assert_eq!(ui.phase, AgentPhase::Idle);
    assert_eq!(ui.iteration, 2);
    assert!(ui.error_message.is_none());
}

#[tokio::test]
async fn test_long_page_is_truncated_in_context() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/long")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_body("z".repeat(500))
        .create_async()
        .await;

    let llm = Arc::new(ScriptedLlmClient::new(["ok", "satisfactory"]));
    let cfg = AppConfig {
        fetch_max_chars: 64,
        ..test_config()
    };
    let (mut s, _rx) = session(llm.clone(), cfg);
    let (_tx, mut cmds) = mpsc::unbounded_channel();

    s.submit(&format!("read {}/long", server.url()), &mut cmds).await;
    let prompt = &llm.prompts()[0][0].content;
    let expected = format!("{}{}", "z".repeat(64), TRUNCATION_MARKER);
    assert!(prompt.contains(&expected));
    assert!(!prompt.contains(&"z".repeat(65)));
}

#[tokio::test]
async fn test_http_error_is_notice_and_turn_continues() {
    let mut server = mockito::Server::new_async().await;
    server.mock("GET", "/missing").with_status(404).create_async().await;

    let llm = Arc::new(ScriptedLlmClient::new(["answer", "satisfactory"]));
    let (mut s, _rx) = session(llm, test_config());
    let (_tx, mut cmds) = mpsc::unbounded_channel();

    let url = format!("{}/missing", server.url());
    let outcome = s.submit(&format!("see {url}"), &mut cmds).await;
    assert_eq!(outcome, TurnOutcome::Completed("answer".into()));

    let notice = s
        .ui_state()
        .notices
        .iter()
        .find(|n| n.level == NoticeLevel::Error)
        .expect("fetch error notice");
    assert!(notice.text.starts_with(&format!("Error fetching {url}: Fetch failed:")));
}

#[tokio::test]
async fn test_reasoned_search_skipped_when_not_needed() {
    let llm = Arc::new(ScriptedLlmClient::new(["I can answer directly.", "answer", "satisfactory"]));
    let cfg = AppConfig {
        auto_search: true,
        ..test_config()
    };
    let (mut s, _rx) = session(llm.clone(), cfg);
    let (_tx, mut cmds) = mpsc::unbounded_channel();

    s.submit("what is 2 + 2?", &mut cmds).await;
    let generate_prompt = &llm.prompts()[1][0].content;
    assert!(!generate_prompt.contains("Search results:"));
    assert_eq!(llm.calls(), 3);
}

#[tokio::test]
async fn test_search_failure_aborts_turn() {
    let llm = Arc::new(ScriptedLlmClient::new(Vec::<String>::new()));
    let cfg = AppConfig {
        auto_search: true,
        ..test_config()
    };
    let (mut s, rx) = session(llm, cfg);
    let (_tx, mut cmds) = mpsc::unbounded_channel();

    let outcome = s.submit("latest news?", &mut cmds).await;
    assert!(matches!(outcome, TurnOutcome::Failed(_)));
    assert_eq!(s.history(), &[Message::user("latest news?")]);
    assert_eq!(rx.borrow().phase, AgentPhase::Error);
}

#[tokio::test]
async fn test_cached_client_replays_identical_run() {
    let scripted = Arc::new(ScriptedLlmClient::new(["cached draft", "satisfactory"]));
    let cache = Arc::new(ResponseCache::new(Some(16)));
    let llm = Arc::new(CachedLlmClient::new(scripted.clone(), cache.clone()));
    let reflection = ReflectionLoop::new(llm, 2);

    let history = vec![Message::user("q")];
    let first = reflection.run_to_completion("ctx", history.clone()).await.unwrap();
    let second = reflection.run_to_completion("ctx", history).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.response, "cached draft");
    assert_eq!(scripted.calls(), 2);
    assert_eq!(cache.len(), 2);
}

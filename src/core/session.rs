//! 单会话运行时：一轮对话的完整流程
//!
//! 用户输入 -> 追加到历史 -> 识别并抓取 URL（失败只提示）-> 可选 reasoned search ->
//! 截断历史 -> 反思循环（流式）-> 提交最终回复。
//! 模型或搜索失败时中断本轮，不提交助手消息；用户取消（丢弃事件流）同样不提交。

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};

use crate::config::AppConfig;
use crate::core::{AgentError, AgentPhase, Command, Notice, UiState};
use crate::llm::{create_llm_from_config, LlmClient};
use crate::memory::{estimate_tokens, ConversationMemory, Message};
use crate::reflection::{ReflectionEvent, ReflectionLoop};
use crate::tools::{
    detect_urls, DuckDuckGoProvider, SearchClient, SearchProvider, ToolRegistry, WebFetcher,
    NO_SEARCH_NEEDED,
};

/// 评审意见在提示栏中的最大显示字符数
const FEEDBACK_PREVIEW_CHARS: usize = 160;

/// 一轮对话的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// 已提交助手回复
    Completed(String),
    /// 斜杠命令已处理（不经过反思循环）
    Command,
    Cancelled,
    Failed(String),
    /// 运行中收到退出命令
    QuitRequested,
}

fn preview(s: &str, max: usize) -> String {
    let head: String = s.chars().take(max).collect();
    if s.chars().count() > max {
        format!("{}...", head)
    } else {
        head
    }
}

/// 会话：独占历史，持有反思循环、抓取器、搜索客户端与工具注册表
pub struct ChatSession {
    cfg: AppConfig,
    history: ConversationMemory,
    llm: Arc<dyn LlmClient>,
    reflection: ReflectionLoop,
    fetcher: Arc<WebFetcher>,
    search: Arc<SearchClient>,
    tools: ToolRegistry,
    state_tx: watch::Sender<UiState>,
    ui: UiState,
    /// 生成期间收到的 Clear，本轮结束后执行
    clear_pending: bool,
}

impl ChatSession {
    /// 按配置创建全部组件
    pub fn from_config(cfg: AppConfig, state_tx: watch::Sender<UiState>) -> Self {
        let llm = create_llm_from_config(&cfg);
        let provider: Arc<dyn SearchProvider> = Arc::new(DuckDuckGoProvider::new(cfg.fetch_timeout_secs));
        Self::with_components(cfg, llm, provider, state_tx)
    }

    /// 注入 LLM 与搜索提供方（测试用 Mock）
    pub fn with_components(
        cfg: AppConfig,
        llm: Arc<dyn LlmClient>,
        provider: Arc<dyn SearchProvider>,
        state_tx: watch::Sender<UiState>,
    ) -> Self {
        let reflection = ReflectionLoop::new(llm.clone(), cfg.max_iterations);
        let fetcher = Arc::new(WebFetcher::new(cfg.fetch_timeout_secs, cfg.fetch_max_chars));
        let search = Arc::new(SearchClient::new(
            provider,
            llm.clone(),
            &cfg.prompt_version,
            cfg.search_results_limit,
        ));

        let mut tools = ToolRegistry::new();
        tools.register(fetcher.clone());
        tools.register(search.clone());

        let ui = UiState {
            max_iterations: cfg.max_iterations,
            ..UiState::default()
        };

        Self {
            cfg,
            history: ConversationMemory::new(),
            llm,
            reflection,
            fetcher,
            search,
            tools,
            state_tx,
            ui,
            clear_pending: false,
        }
    }

    pub fn history(&self) -> &[Message] {
        self.history.messages()
    }

    pub fn ui_state(&self) -> &UiState {
        &self.ui
    }

    fn publish(&self) {
        let _ = self.state_tx.send(self.ui.clone());
    }

    fn notice(&mut self, notice: Notice) {
        self.ui.notices.push(notice);
        self.publish();
    }

    /// 清空历史、提示与响应缓存
    pub fn clear(&mut self) {
        self.clear_pending = false;
        self.history.clear();
        self.llm.clear_cache();
        self.ui = UiState {
            max_iterations: self.cfg.max_iterations,
            ..UiState::default()
        };
        self.ui.notices.push(Notice::info("History cleared!"));
        self.publish();
        tracing::info!("conversation cleared");
    }

    fn finish_turn(&mut self, phase: AgentPhase, error: Option<String>) {
        self.ui.phase = phase;
        self.ui.history = self.history.messages().to_vec();
        self.ui.streaming.clear();
        self.ui.input_locked = false;
        self.ui.error_message = error;
        self.publish();
    }

    /// 处理一次用户提交；commands 用于在流式输出期间接收取消/退出
    pub async fn submit(
        &mut self,
        input: &str,
        commands: &mut mpsc::UnboundedReceiver<Command>,
    ) -> TurnOutcome {
        let input = input.trim();
        if input.is_empty() {
            return TurnOutcome::Command;
        }
        if let Some(cmd) = input.strip_prefix('/') {
            return self.run_slash_command(cmd).await;
        }

        self.ui.notices.clear();
        self.ui.error_message = None;
        self.ui.input_locked = true;
        self.history.push(Message::user(input));
        self.ui.history = self.history.messages().to_vec();
        self.publish();

        let context = self.build_context(input).await;
        let context = match self.augment_with_search(context).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "search failed, turn aborted");
                let msg = e.to_string();
                self.finish_turn(AgentPhase::Error, Some(msg.clone()));
                return TurnOutcome::Failed(msg);
            }
        };

        let dropped = self.history.truncate_to(self.cfg.max_tokens);
        if dropped > 0 {
            tracing::info!(
                dropped,
                remaining = self.history.len(),
                estimated_tokens = estimate_tokens(self.history.messages()),
                "history truncated"
            );
            self.ui.notices.push(Notice::info(format!(
                "History truncated: dropped {} older message(s)",
                dropped
            )));
        }

        let outcome = self.run_reflection(context, commands).await;
        if self.clear_pending && outcome != TurnOutcome::QuitRequested {
            self.clear();
        }
        outcome
    }

    /// 识别输入中的 URL 并抓取，成功的内容拼入上下文；失败只记提示
    async fn build_context(&mut self, input: &str) -> String {
        let mut context = input.to_string();
        let urls = detect_urls(input);
        if urls.is_empty() {
            return context;
        }

        self.ui.phase = AgentPhase::Fetching;
        self.notice(Notice::info("Fetching URL content..."));
        for url in urls {
            match self.fetcher.fetch(&url).await {
                Ok(fetched) => {
                    context.push_str(&format!("\n\nFetched from {}:\n{}", url, fetched));
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "fetch failed");
                    let text = format!("Error fetching {}: {}", url, e);
                    self.notice(if e.is_transient() {
                        Notice::warning(text)
                    } else {
                        Notice::error(text)
                    });
                }
            }
        }
        context
    }

    async fn augment_with_search(&mut self, context: String) -> Result<String, AgentError> {
        if !self.cfg.auto_search {
            return Ok(context);
        }
        self.ui.phase = AgentPhase::Searching;
        self.publish();

        let results = self.search.reasoned_search(&context).await?;
        if results == NO_SEARCH_NEEDED {
            return Ok(context);
        }
        self.notice(Notice::info(format!(
            "Search results added: {}",
            preview(&results, FEEDBACK_PREVIEW_CHARS)
        )));
        Ok(format!("{}\n\nSearch results:\n{}", context, results))
    }

    async fn run_reflection(
        &mut self,
        context: String,
        commands: &mut mpsc::UnboundedReceiver<Command>,
    ) -> TurnOutcome {
        let mut events = self.reflection.run(context, self.history.messages().to_vec());
        let mut final_response = None;

        loop {
            tokio::select! {
                biased;
                Some(cmd) = commands.recv() => {
                    match cmd {
                        // 返回即丢弃事件流，进行中的模型请求随之取消
                        Command::Cancel => {
                            tracing::info!("reflection cancelled by user");
                            self.ui.notices.push(Notice::warning("Generation cancelled"));
                            self.finish_turn(AgentPhase::Idle, None);
                            return TurnOutcome::Cancelled;
                        }
                        Command::Quit => return TurnOutcome::QuitRequested,
                        Command::Clear => {
                            self.clear_pending = true;
                            self.notice(Notice::info("History will be cleared when this reply finishes"));
                        }
                        Command::Submit(input) => {
                            tracing::debug!(input = %input, "submit ignored while generating");
                        }
                    }
                }
                event = events.next() => {
                    let Some(event) = event else { break };
                    match event {
                        Ok(ev) => {
                            if let ReflectionEvent::Done { response, .. } = &ev {
                                final_response = Some(response.clone());
                            }
                            self.apply_event(ev);
                        }
                        Err(e) => {
                            let err = AgentError::from(e);
                            tracing::warn!(error = %err, "reflection failed, turn aborted");
                            let msg = err.to_string();
                            self.finish_turn(AgentPhase::Error, Some(msg.clone()));
                            return TurnOutcome::Failed(msg);
                        }
                    }
                }
            }
        }

        let response = final_response.unwrap_or_default();
        self.history.push(Message::assistant(response.clone()));
        self.finish_turn(AgentPhase::Idle, None);
        TurnOutcome::Completed(response)
    }

    fn apply_event(&mut self, event: ReflectionEvent) {
        match event {
            ReflectionEvent::DraftStarted { iteration, .. } => {
                self.ui.phase = AgentPhase::Generating;
                self.ui.iteration = iteration;
                self.ui.streaming.clear();
            }
            ReflectionEvent::Token { text } => self.ui.streaming.push_str(&text),
            ReflectionEvent::DraftDone { .. } => {}
            ReflectionEvent::Critiquing { .. } => self.ui.phase = AgentPhase::Critiquing,
            ReflectionEvent::Critique {
                iteration,
                feedback,
                satisfactory,
            } => {
                let label = if satisfactory { "accepted" } else { "revising" };
                self.ui.notices.push(Notice::info(format!(
                    "Critique #{} ({}): {}",
                    iteration,
                    label,
                    preview(feedback.trim(), FEEDBACK_PREVIEW_CHARS)
                )));
            }
            ReflectionEvent::Done { .. } => {}
        }
        self.publish();
    }

    /// `/clear`、`/help`、`/<tool> <arg>`（fetch / search）
    async fn run_slash_command(&mut self, cmd: &str) -> TurnOutcome {
        let (name, arg) = match cmd.split_once(char::is_whitespace) {
            Some((n, a)) => (n, a.trim()),
            None => (cmd, ""),
        };
        match name {
            "clear" => self.clear(),
            "help" => {
                let mut lines = vec!["/clear - clear conversation history".to_string()];
                for (tool, desc) in self.tools.tool_descriptions() {
                    lines.push(format!("/{} - {}", tool, desc));
                }
                self.notice(Notice::info(lines.join("\n")));
            }
            tool => {
                let args = match tool {
                    "fetch" => serde_json::json!({ "url": arg }),
                    "search" => serde_json::json!({ "query": arg }),
                    _ => serde_json::Value::Null,
                };
                match self.tools.execute(tool, args).await {
                    Ok(out) => self.notice(Notice::info(format!("/{} {}\n{}", tool, arg, out))),
                    Err(e) => self.notice(Notice::error(format!("/{}: {}", tool, e))),
                }
            }
        }
        TurnOutcome::Command
    }
}

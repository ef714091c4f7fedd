//! 编排器：主控循环
//!
//! 负责：加载配置、创建 ChatSession、建立 cmd/state 两通道，
//! 并在后台任务中消费用户命令（Submit/Cancel/Clear/Quit），驱动会话并更新 UI 状态。

use std::path::PathBuf;

use tokio::sync::{mpsc, watch};

use crate::config::{load_config, AppConfig};
use crate::core::session::{ChatSession, TurnOutcome};
use crate::core::UiState;

/// 从 UI 发往编排器的用户命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 提交用户输入（含斜杠命令），触发一轮对话
    Submit(String),
    /// 取消当前生成：丢弃反思事件流，不提交任何助手消息
    Cancel,
    /// 清空对话历史
    Clear,
    /// 退出应用
    Quit,
}

/// 命令循环：一次只处理一个会话的一轮，生成期间的 Cancel/Quit/Clear 由 ChatSession 处理
pub async fn run_session(mut session: ChatSession, mut cmd_rx: mpsc::UnboundedReceiver<Command>) {
    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            Command::Submit(input) => match session.submit(&input, &mut cmd_rx).await {
                TurnOutcome::QuitRequested => break,
                outcome => tracing::debug!(?outcome, "turn finished"),
            },
            Command::Cancel => tracing::debug!("cancel with no turn in flight"),
            Command::Clear => session.clear(),
            Command::Quit => break,
        }
    }
    tracing::info!("session loop stopped");
}

/// 创建 Agent 运行时：返回命令发送端与状态接收端；后台任务消费命令并更新 state。
pub async fn create_agent(
    config_path: Option<PathBuf>,
) -> anyhow::Result<(mpsc::UnboundedSender<Command>, watch::Receiver<UiState>)> {
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    tracing::info!(
        model_type = %cfg.model_type,
        max_iterations = cfg.max_iterations,
        auto_search = cfg.auto_search,
        "config loaded"
    );

    // 两通道：UI -> Core 命令；Core -> UI 状态快照（流式草稿随快照下发）
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Command>();
    let (state_tx, state_rx) = watch::channel(UiState {
        max_iterations: cfg.max_iterations,
        ..UiState::default()
    });

    let session = ChatSession::from_config(cfg, state_tx);
    tokio::spawn(run_session(session, cmd_rx));

    Ok((cmd_tx, state_rx))
}

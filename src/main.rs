//! Reflector - Rust 反思式对话智能体
//!
//! 入口：加载 .env、初始化日志、创建编排器与 TUI，并运行主循环。

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use reflector::{core::create_agent, ui::run_app};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "reflector", version, about = "Reflective chat agent: generate, critique, refine")]
struct Cli {
    /// 额外的配置文件（覆盖 config/default.toml）
    #[arg(short, long, env = "REFLECTOR_CONFIG")]
    config: Option<PathBuf>,

    /// 日志目录（TUI 占用 stdout，日志写入文件）
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // 日志：默认 info，可通过 RUST_LOG 覆盖；写入 logs/reflector.log
    std::fs::create_dir_all(&cli.log_dir).context("Failed to create log directory")?;
    let appender = tracing_appender::rolling::never(&cli.log_dir, "reflector.log");
    let (writer, _guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .init();

    // 创建 Agent：返回命令发送端、状态接收端
    let (cmd_tx, state_rx) = create_agent(cli.config)
        .await
        .context("Failed to create agent")?;

    // 启动 TUI 主循环（消费 state，向 cmd_tx 发送用户指令）
    run_app(state_rx, cmd_tx).await.context("App run failed")?;

    tracing::info!("bye");
    Ok(())
}

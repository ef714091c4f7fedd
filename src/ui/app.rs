//! TUI 应用主循环
//!
//! 进入全屏/原始模式，轮询 state_rx 与键盘事件，将用户输入与快捷键转为 Command 发送给编排器，
//! 每帧用 draw 渲染 UiState 与输入缓冲。

use std::io::{self, Stdout};

use crossterm::event::KeyCode;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::{mpsc, watch};

use crate::core::{Command, UiState};
use crate::ui::event::{AppEvent, EventHandler};
use crate::ui::render::draw;

/// 输入是否为退出指令
fn is_quit(input: &str) -> bool {
    matches!(input.to_lowercase().as_str(), "/exit" | "exit" | "/quit" | "quit")
}

/// 运行 TUI：启用原始模式与全屏，循环 poll 事件 + 渲染，退出时恢复终端
pub async fn run_app(
    mut state_rx: watch::Receiver<UiState>,
    cmd_tx: mpsc::UnboundedSender<Command>,
) -> anyhow::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = event_loop(&mut terminal, &mut state_rx, EventHandler::new(cmd_tx)).await;

    restore_terminal(&mut terminal)?;
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    state_rx: &mut watch::Receiver<UiState>,
    event_handler: EventHandler,
) -> anyhow::Result<()> {
    let mut input_buffer = String::new();
    let mut conversation_scroll = 0usize;
    let mut last_len = (0usize, 0usize);

    loop {
        let state = state_rx.borrow_and_update().clone();

        // 有新消息或草稿增长时跟随到底部
        let len = (state.history.len(), state.streaming.len());
        if len != last_len {
            last_len = len;
            conversation_scroll = usize::MAX;
        }

        if let Some(ev) = event_handler.poll()? {
            match ev {
                AppEvent::Command(Command::Quit) => break,
                AppEvent::Command(_) => {}
                AppEvent::Key(key) => match key.code {
                    KeyCode::Up => conversation_scroll = conversation_scroll.saturating_sub(1),
                    KeyCode::Down => conversation_scroll = conversation_scroll.saturating_add(1),
                    KeyCode::PageUp => conversation_scroll = conversation_scroll.saturating_sub(10),
                    KeyCode::PageDown => conversation_scroll = conversation_scroll.saturating_add(10),
                    KeyCode::Home => conversation_scroll = 0,
                    KeyCode::End => conversation_scroll = usize::MAX,
                    _ if state.input_locked => {}
                    KeyCode::Enter => {
                        let input = input_buffer.trim().to_string();
                        input_buffer.clear();
                        if is_quit(&input) {
                            event_handler.send_quit();
                            break;
                        }
                        if !input.is_empty() {
                            event_handler.send_submit(input);
                        }
                    }
                    KeyCode::Backspace => {
                        input_buffer.pop();
                    }
                    KeyCode::Char(c) => input_buffer.push(c),
                    _ => {}
                },
            }
        }

        let mut scroll_info = (0usize, 0usize);
        terminal.draw(|f| draw(f, &state, &input_buffer, conversation_scroll, &mut scroll_info))?;
        let (total_lines, viewport_height) = scroll_info;
        conversation_scroll = conversation_scroll.min(total_lines.saturating_sub(viewport_height));

        tokio::task::yield_now().await;
    }
    Ok(())
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

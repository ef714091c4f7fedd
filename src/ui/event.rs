//! 事件处理
//!
//! 轮询 crossterm 键盘事件，将 Ctrl+C/Esc/Ctrl+L/Ctrl+Q 转为 Command（Cancel/Clear/Quit），
//! 其余按键交给 run_app 拼 input_buffer，Enter 时 send_submit。

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;

use crate::core::Command;

/// 应用事件：来自快捷键的 Command 或原始 KeyEvent
#[derive(Debug, Clone)]
pub enum AppEvent {
    Command(Command),
    Key(KeyEvent),
}

/// 快捷键映射；None 表示普通按键
pub fn shortcut(key: &KeyEvent) -> Option<Command> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => Some(Command::Cancel),
        KeyCode::Esc => Some(Command::Cancel),
        KeyCode::Char('l') if ctrl => Some(Command::Clear),
        KeyCode::Char('q') if ctrl => Some(Command::Quit),
        _ => None,
    }
}

/// 事件处理器：持有 cmd_tx，poll 时读键盘并返回 AppEvent，send_submit 发送用户输入
pub struct EventHandler {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl EventHandler {
    pub fn new(cmd_tx: mpsc::UnboundedSender<Command>) -> Self {
        Self { cmd_tx }
    }

    pub fn poll(&self) -> anyhow::Result<Option<AppEvent>> {
        if event::poll(std::time::Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    return Ok(Some(self.handle_key(key)));
                }
            }
        }
        Ok(None)
    }

    fn handle_key(&self, key: KeyEvent) -> AppEvent {
        match shortcut(&key) {
            Some(cmd) => {
                let _ = self.cmd_tx.send(cmd.clone());
                AppEvent::Command(cmd)
            }
            None => AppEvent::Key(key),
        }
    }

    pub fn send_submit(&self, input: String) {
        let _ = self.cmd_tx.send(Command::Submit(input));
    }

    pub fn send_quit(&self) {
        let _ = self.cmd_tx.send(Command::Quit);
    }
}

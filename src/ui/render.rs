//! 界面渲染
//!
//! 根据 UiState 与 input_buffer 绘制：标题栏显示 phase 与迭代进度，
//! 主体为对话历史（按角色着色、按宽度换行）加实时草稿，其下为提示区，底部为输入框与快捷键提示。

use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
    Frame,
};

use crate::core::{AgentPhase, NoticeLevel, UiState};
use crate::memory::Role;

/// 单条消息在 UI 中显示的最大字符数；抓取进来的整页内容不会进历史，但长回复仍需折叠
const MAX_DISPLAY_CHARS: usize = 4000;
/// 提示区最多显示的行数
const MAX_NOTICE_LINES: u16 = 6;

/// 对过长内容做折叠：保留前 N 字 + 省略提示
fn truncate_for_display(content: &str) -> String {
    let total = content.chars().count();
    if total <= MAX_DISPLAY_CHARS {
        return content.to_string();
    }
    let head: String = content.chars().take(MAX_DISPLAY_CHARS).collect();
    format!("{}\n... [{} chars total]", head, total)
}

/// 将内容按宽度换行，支持 UTF-8（按字符数，避免在 UTF-8 中间截断）
fn wrap_text(s: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![s.to_string()];
    }
    let mut lines = Vec::new();
    for para in s.split('\n') {
        let mut line = String::new();
        for ch in para.chars() {
            if line.chars().count() >= width {
                lines.push(std::mem::take(&mut line));
            }
            line.push(ch);
        }
        lines.push(line);
    }
    lines
}

fn phase_label(state: &UiState) -> String {
    match state.phase {
        AgentPhase::Idle => "Idle".to_string(),
        AgentPhase::Fetching => "Fetching URL…".to_string(),
        AgentPhase::Searching => "Searching…".to_string(),
        AgentPhase::Generating => format!("Generating {}/{}", state.iteration, state.max_iterations.max(1)),
        AgentPhase::Critiquing => format!("Critiquing {}/{}", state.iteration, state.max_iterations.max(1)),
        AgentPhase::Error => "Error".to_string(),
    }
}

fn push_message(lines: &mut Vec<Line<'static>>, prefix: &'static str, color: Color, content: &str, width: usize) {
    for (i, line) in wrap_text(content, width).into_iter().enumerate() {
        let pref = if i == 0 { prefix } else { "    " };
        lines.push(Line::from(vec![
            Span::styled(pref, Style::default().fg(color).add_modifier(Modifier::BOLD)),
            Span::raw(line),
        ]));
    }
}

/// 绘制一帧；将 (总行数, 可视高度) 写入 out 供外部 clamp 滚动
pub fn draw(f: &mut Frame, state: &UiState, input_buffer: &str, conversation_scroll: usize, out: &mut (usize, usize)) {
    let notice_height = if state.notices.is_empty() {
        0
    } else {
        (state.notices.len() as u16).min(MAX_NOTICE_LINES) + 2
    };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),
            Constraint::Length(notice_height),
            Constraint::Length(5),
        ])
        .split(f.area());

    let conv_area = chunks[0];
    let content_width = (conv_area.width.saturating_sub(3) as usize).max(20); // 边框 + 滚动条

    let block = Block::default()
        .title(format!(" Reflector │ {} ", phase_label(state)))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let mut text_lines: Vec<Line> = Vec::new();
    for (idx, m) in state.history.iter().enumerate() {
        if idx > 0 {
            text_lines.push(Line::from(""));
        }
        let (prefix, color) = match m.role {
            Role::User => ("You ", Color::Cyan),
            Role::Assistant => ("AI  ", Color::Green),
            Role::System => ("Sys ", Color::Gray),
        };
        push_message(&mut text_lines, prefix, color, &truncate_for_display(&m.content), content_width);
    }
    if !state.streaming.is_empty() {
        if !text_lines.is_empty() {
            text_lines.push(Line::from(""));
        }
        push_message(&mut text_lines, "AI… ", Color::DarkGray, &state.streaming, content_width);
    }

    let content_height = conv_area.height.saturating_sub(2) as usize;
    let total_lines = text_lines.len();
    let scroll_offset = conversation_scroll.min(total_lines.saturating_sub(content_height));

    let inner = block.inner(conv_area);
    f.render_widget(
        Paragraph::new(Text::from(text_lines))
            .block(block)
            .scroll((scroll_offset as u16, 0)),
        conv_area,
    );

    if total_lines > content_height {
        let mut scrollbar_state = ScrollbarState::new(total_lines)
            .position(scroll_offset)
            .viewport_content_length(content_height);
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .thumb_symbol("█")
            .track_symbol(Some("░"));
        f.render_stateful_widget(scrollbar, inner, &mut scrollbar_state);
    }

    if notice_height > 0 {
        let skip = state.notices.len().saturating_sub(MAX_NOTICE_LINES as usize);
        let lines: Vec<Line> = state
            .notices
            .iter()
            .skip(skip)
            .map(|n| {
                let color = match n.level {
                    NoticeLevel::Info => Color::Gray,
                    NoticeLevel::Warning => Color::Yellow,
                    NoticeLevel::Error => Color::Red,
                };
                Line::from(Span::styled(n.text.replace('\n', " ⏎ "), Style::default().fg(color)))
            })
            .collect();
        let notices = Paragraph::new(lines)
            .block(Block::default().title(" Notices ").borders(Borders::ALL))
            .wrap(Wrap { trim: true });
        f.render_widget(notices, chunks[1]);
    }

    let input_prompt = if let Some(err) = &state.error_message {
        format!(" Error: {} ", err.chars().take(60).collect::<String>())
    } else if state.input_locked {
        " Waiting for reply… ".to_string()
    } else {
        " Input ".to_string()
    };
    let border_color = if state.error_message.is_some() {
        Color::Red
    } else {
        Color::Blue
    };

    let hint = " Enter send │ ↑↓ PgUp/PgDn scroll │ Esc cancel │ Ctrl+L clear │ Ctrl+Q quit │ /help ";
    let input_block = Block::default()
        .title(input_prompt)
        .title_bottom(Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    let input = Paragraph::new(input_buffer)
        .block(input_block)
        .wrap(Wrap { trim: false })
        .style(if state.input_locked {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        });
    f.render_widget(input, chunks[2]);

    out.0 = total_lines;
    out.1 = content_height;
}

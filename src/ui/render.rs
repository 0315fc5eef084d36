//! 界面渲染
//!
//! 未登录时绘制登录页（授权链接 + Token 输入框）；已登录时左侧为对话历史与输入框，
//! 右侧侧栏依次显示用户、三个阶段的 trace 步骤、本轮引用。

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
    Frame,
};

use crate::core::{ChatPhase, UiState};
use crate::session::Role;
use crate::trace::PhaseTrace;

/// 界面本地状态（不经过编排器）
#[derive(Debug, Default, Clone)]
pub struct ViewState {
    pub input_buffer: String,
    pub conversation_scroll: usize,
    pub sidebar_scroll: usize,
    /// 侧栏是否展开 JSON 详情
    pub show_detail: bool,
}

/// 侧栏行的类别，决定样式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidebarKind {
    Heading,
    Subheading,
    Item,
    Detail,
    Muted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarLine {
    pub kind: SidebarKind,
    pub text: String,
}

impl SidebarLine {
    fn new(kind: SidebarKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
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

fn pretty_json(value: &serde_json::Value) -> Vec<String> {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|_| value.to_string())
        .lines()
        .map(|l| format!("    {l}"))
        .collect()
}

/// 侧栏内容：用户、Trace（每阶段步骤或 None）、Citations
pub fn sidebar_lines(state: &UiState, show_detail: bool) -> Vec<SidebarLine> {
    let mut out = Vec::new();
    if let Some(user) = &state.user {
        out.push(SidebarLine::new(SidebarKind::Heading, format!("👤 Welcome, {}", user.name)));
        out.push(SidebarLine::new(SidebarKind::Muted, user.email.clone()));
        out.push(SidebarLine::new(SidebarKind::Muted, ""));
    }

    out.push(SidebarLine::new(SidebarKind::Heading, "Trace"));
    for phase in &state.trace.phases {
        out.push(SidebarLine::new(SidebarKind::Subheading, phase.phase.label()));
        match &phase.trace {
            PhaseTrace::Empty => out.push(SidebarLine::new(SidebarKind::Muted, "  None")),
            PhaseTrace::Steps(steps) => {
                for step in steps {
                    out.push(SidebarLine::new(
                        SidebarKind::Item,
                        format!("  ▸ Trace Step {}", step.step_number),
                    ));
                    for event in &step.events {
                        out.push(SidebarLine::new(SidebarKind::Muted, format!("    · {}", event.subtype)));
                        if show_detail {
                            out.extend(
                                pretty_json(&event.payload)
                                    .into_iter()
                                    .map(|l| SidebarLine::new(SidebarKind::Detail, l)),
                            );
                        }
                    }
                }
            }
        }
    }
    if state.trace.phases.is_empty() {
        out.push(SidebarLine::new(SidebarKind::Muted, "  None"));
    }

    out.push(SidebarLine::new(SidebarKind::Muted, ""));
    out.push(SidebarLine::new(SidebarKind::Heading, "Citations"));
    if state.citations.is_empty() {
        out.push(SidebarLine::new(SidebarKind::Muted, "  None"));
    }
    for entry in &state.citations {
        out.push(SidebarLine::new(
            SidebarKind::Item,
            format!(
                "  ▸ Citation [{}] - Reference {}",
                entry.display_key, entry.occurrence
            ),
        ));
        if show_detail {
            let detail = serde_json::json!({
                "generatedResponsePart": entry.generated_response_part,
                "retrievedReference": entry.retrieved_reference,
            });
            out.extend(
                pretty_json(&detail)
                    .into_iter()
                    .map(|l| SidebarLine::new(SidebarKind::Detail, l)),
            );
        }
    }
    out
}

fn sidebar_style(kind: SidebarKind) -> Style {
    match kind {
        SidebarKind::Heading => Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        SidebarKind::Subheading => Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        SidebarKind::Item => Style::default(),
        SidebarKind::Detail => Style::default().fg(Color::Gray),
        SidebarKind::Muted => Style::default().fg(Color::DarkGray),
    }
}

/// 绘制一帧；将 (对话总行数, 对话可视高度) 写入 out 供外部 clamp 滚动
pub fn draw(f: &mut Frame, state: &UiState, view: &ViewState, out: &mut (usize, usize)) {
    if state.is_authenticated() {
        draw_chat(f, state, view, out);
    } else {
        draw_login(f, state, view);
        *out = (0, 0);
    }
}

fn draw_login(f: &mut Frame, state: &UiState, view: &ViewState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(6), Constraint::Length(3)])
        .split(f.area());

    let mut lines = vec![
        Line::from(Span::styled(
            "Hi !",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    match &state.login_url {
        Some(url) => {
            lines.push(Line::from("Open this link to continue with Google:"));
            lines.push(Line::from(Span::styled(url.clone(), Style::default().fg(Color::Cyan))));
            lines.push(Line::from(""));
            lines.push(Line::from("Then paste the ID token below and press Enter."));
        }
        None => lines.push(Line::from("Enter your identity token and press Enter.")),
    }
    if let Some(notice) = &state.notice {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(notice.clone(), Style::default().fg(Color::Red))));
    }

    let block = Block::default()
        .title(format!(" {} │ Login ", state.heading()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));
    f.render_widget(
        Paragraph::new(Text::from(lines)).block(block).wrap(Wrap { trim: false }),
        chunks[0],
    );

    let hint = " Enter 登录 │ Ctrl+Q 退出 ";
    let input_block = Block::default()
        .title(" Token ")
        .title_bottom(Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue));
    f.render_widget(
        Paragraph::new(masked(&view.input_buffer)).block(input_block),
        chunks[1],
    );
}

/// 登录输入不回显原文
fn masked(input: &str) -> String {
    "•".repeat(input.chars().count())
}

fn draw_chat(f: &mut Frame, state: &UiState, view: &ViewState, out: &mut (usize, usize)) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(68), Constraint::Percentage(32)])
        .split(f.area());

    // 输入区至少 5 行，便于多行输入可见
    let input_height = 5u16;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(input_height)])
        .split(columns[0]);

    let conv_area = chunks[0];
    let content_width = conv_area.width.saturating_sub(2).saturating_sub(1) as usize; // 边框 + 滚动条

    let phase_str = match state.phase {
        ChatPhase::Idle => "空闲",
        ChatPhase::Waiting => "等待回复…",
        ChatPhase::Error => "错误",
    };
    let block = Block::default()
        .title(format!(" {} │ {} ", state.heading(), phase_str))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let mut text_lines: Vec<Line> = Vec::new();
    for (idx, m) in state.history.iter().enumerate() {
        if idx > 0 {
            text_lines.push(Line::from(Span::raw("")));
        }
        let (prefix, color) = match m.role {
            Role::User => ("You ", Color::Cyan),
            Role::Assistant => ("Bot ", Color::Green),
        };
        for (i, line) in wrap_text(&m.content, content_width.max(40)).into_iter().enumerate() {
            let pref = if i == 0 { prefix } else { "    " };
            text_lines.push(Line::from(vec![
                Span::styled(pref, Style::default().fg(color).add_modifier(Modifier::BOLD)),
                Span::raw(line),
            ]));
        }
    }

    let content_height = conv_area.height.saturating_sub(2) as usize; // 边框
    let total_lines = text_lines.len();
    let max_scroll = total_lines.saturating_sub(content_height);
    let scroll_offset = view.conversation_scroll.min(max_scroll);

    let inner = block.inner(conv_area);
    f.render_widget(block, conv_area);
    f.render_widget(
        Paragraph::new(Text::from(text_lines)).scroll((scroll_offset as u16, 0)),
        inner,
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

    draw_input(f, state, view, chunks[1]);
    draw_sidebar(f, state, view, columns[1]);

    out.0 = total_lines;
    out.1 = content_height;
}

fn draw_input(f: &mut Frame, state: &UiState, view: &ViewState, area: Rect) {
    let input_prompt = if let Some(err) = &state.error_message {
        format!(" 错误: {} ", err.chars().take(48).collect::<String>())
    } else if state.input_locked {
        " 等待回复… ".to_string()
    } else {
        " 输入 ".to_string()
    };
    let border_color = if state.error_message.is_some() {
        Color::Red
    } else {
        Color::Blue
    };

    let hint = " Enter 发送 │ Ctrl+R 重置 │ Ctrl+T 详情 │ Ctrl+O 登出 │ Ctrl+Q 退出 ";
    let input_block = Block::default()
        .title(input_prompt)
        .title_bottom(Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    let input = Paragraph::new(view.input_buffer.as_str())
        .block(input_block)
        .wrap(Wrap { trim: false })
        .style(if state.input_locked {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        });
    f.render_widget(input, area);
}

fn draw_sidebar(f: &mut Frame, state: &UiState, view: &ViewState, area: Rect) {
    let lines: Vec<Line> = sidebar_lines(state, view.show_detail)
        .into_iter()
        .map(|l| Line::from(Span::styled(l.text, sidebar_style(l.kind))))
        .collect();
    let height = area.height.saturating_sub(2) as usize;
    let scroll = view.sidebar_scroll.min(lines.len().saturating_sub(height));
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    f.render_widget(
        Paragraph::new(Text::from(lines))
            .block(block)
            .scroll((scroll as u16, 0)),
        area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Identity;
    use crate::citations::{CitationEntry, DisplayKey};
    use crate::trace::{TraceAggregator, TraceMap};
    use serde_json::json;

    fn logged_in_state() -> UiState {
        let mut trace = TraceMap::new();
        trace.insert(
            "orchestrationTrace".into(),
            vec![json!({"rationale": {"traceId": "t-1", "text": "why"}})],
        );
        UiState {
            user: Some(Identity {
                email: "ann@example.com".into(),
                name: "Ann".into(),
                picture: None,
            }),
            trace: TraceAggregator::default().aggregate(&trace),
            citations: vec![CitationEntry {
                display_key: DisplayKey::sequential(1),
                occurrence: 1,
                generated_response_part: json!({}),
                retrieved_reference: json!({"location": {"type": "WEB"}}),
            }],
            ..UiState::default()
        }
    }

    #[test]
    fn test_sidebar_lists_phases_steps_and_citations() {
        let lines = sidebar_lines(&logged_in_state(), false);
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts[0], "👤 Welcome, Ann");
        let pre = texts.iter().position(|t| *t == "Pre-Processing").unwrap();
        assert_eq!(texts[pre + 1], "  None");
        assert!(texts.contains(&"  ▸ Trace Step 1"));
        assert!(texts.contains(&"    · rationale"));
        assert!(texts.contains(&"  ▸ Citation [1] - Reference 1"));
        assert!(lines.iter().all(|l| l.kind != SidebarKind::Detail));
    }

    #[test]
    fn test_sidebar_detail_includes_json() {
        let lines = sidebar_lines(&logged_in_state(), true);
        assert!(lines
            .iter()
            .any(|l| l.kind == SidebarKind::Detail && l.text.contains("\"traceId\": \"t-1\"")));
        assert!(lines
            .iter()
            .any(|l| l.kind == SidebarKind::Detail && l.text.contains("retrievedReference")));
    }

    #[test]
    fn test_sidebar_without_turn_shows_none() {
        let state = UiState::default();
        let texts: Vec<String> = sidebar_lines(&state, false).into_iter().map(|l| l.text).collect();
        assert_eq!(texts.iter().filter(|t| t.as_str() == "  None").count(), 2);
    }

    #[test]
    fn test_login_token_is_masked() {
        assert_eq!(masked("eyJhbGci"), "••••••••");
        assert_eq!(masked("ä|b"), "•••");
        assert_eq!(masked(""), "");
    }

    #[test]
    fn test_wrap_text_keeps_blank_lines() {
        assert_eq!(wrap_text("ab\n\ncd", 10), vec!["ab", "", "cd"]);
        assert_eq!(wrap_text("abcdef", 4), vec!["abcd", "ef"]);
    }
}

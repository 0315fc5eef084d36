//! TUI 应用主循环
//!
//! 进入全屏/原始模式，轮询 state_rx 与键盘事件，将用户输入与快捷键转为 Command 发送给编排器，
//! 每帧用 draw 渲染 UiState 与本地 ViewState。登录态丢失（登出或超时）时丢弃正在编辑的输入。

use std::io::{self, Stdout};

use crossterm::event::{KeyCode, KeyModifiers};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::{mpsc, watch};

use crate::core::{Command, UiState};
use crate::ui::event::{AppEvent, EventHandler};
use crate::ui::render::{draw, ViewState};

/// 运行 TUI：启用原始模式与全屏，循环 poll 事件 + 渲染，退出时恢复终端
pub async fn run_app(
    state_rx: watch::Receiver<UiState>,
    cmd_tx: mpsc::UnboundedSender<Command>,
) -> anyhow::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, state_rx, cmd_tx).await;

    restore_terminal(&mut terminal)?;
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    state_rx: watch::Receiver<UiState>,
    cmd_tx: mpsc::UnboundedSender<Command>,
) -> anyhow::Result<()> {
    let event_handler = EventHandler::new(cmd_tx);
    let mut view = ViewState::default();
    let mut last_history_len = 0usize;
    let mut was_authenticated = false;

    loop {
        let state = state_rx.borrow().clone();

        if was_authenticated && !state.is_authenticated() {
            view = ViewState::default();
        }
        was_authenticated = state.is_authenticated();

        if state.history.len() != last_history_len {
            last_history_len = state.history.len();
            view.conversation_scroll = usize::MAX;
        }

        if let Some(ev) = event_handler.poll()? {
            match ev {
                AppEvent::Command(Command::Quit) => {
                    event_handler.send_quit();
                    break;
                }
                AppEvent::Command(_) => {}
                AppEvent::ToggleDetail => view.show_detail = !view.show_detail,
                AppEvent::Key(key) if !state.input_locked => {
                    let alt = key.modifiers.contains(KeyModifiers::ALT);
                    match key.code {
                        KeyCode::Enter => {
                            let input = view.input_buffer.trim().to_string();
                            view.input_buffer.clear();
                            if !input.is_empty() {
                                if state.is_authenticated() {
                                    event_handler.send_submit(input);
                                } else {
                                    event_handler.send_login(input);
                                }
                            }
                        }
                        KeyCode::Backspace => {
                            view.input_buffer.pop();
                        }
                        KeyCode::Char(c) => view.input_buffer.push(c),
                        KeyCode::Up if alt => {
                            view.sidebar_scroll = view.sidebar_scroll.saturating_sub(1);
                        }
                        KeyCode::Down if alt => {
                            view.sidebar_scroll = view.sidebar_scroll.saturating_add(1);
                        }
                        KeyCode::Up => {
                            view.conversation_scroll = view.conversation_scroll.saturating_sub(1);
                        }
                        KeyCode::Down => {
                            view.conversation_scroll = view.conversation_scroll.saturating_add(1);
                        }
                        KeyCode::PageUp => {
                            view.conversation_scroll = view.conversation_scroll.saturating_sub(10);
                        }
                        KeyCode::PageDown => {
                            view.conversation_scroll = view.conversation_scroll.saturating_add(10);
                        }
                        KeyCode::Home => view.conversation_scroll = 0,
                        KeyCode::End => view.conversation_scroll = usize::MAX,
                        _ => {}
                    }
                }
                AppEvent::Key(_) => {}
            }
        }

        let mut scroll_info = (0usize, 0usize);
        terminal.draw(|f| draw(f, &state, &view, &mut scroll_info))?;
        let (total_lines, viewport_height) = scroll_info;
        view.conversation_scroll = view
            .conversation_scroll
            .min(total_lines.saturating_sub(viewport_height));

        tokio::task::yield_now().await;
    }
    Ok(())
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

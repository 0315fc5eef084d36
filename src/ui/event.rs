//! 事件处理
//!
//! 轮询 crossterm 键盘事件：Ctrl+Q 退出、Ctrl+R 重置对话、Ctrl+O 登出、Ctrl+T 切换 JSON 详情，
//! 其余按键交给 run_app 拼 input_buffer，Enter 时 send_submit / send_login。

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;

use crate::core::Command;

/// 应用事件：发往编排器的 Command、界面本地动作或原始 KeyEvent
#[derive(Debug, Clone)]
pub enum AppEvent {
    Command(Command),
    ToggleDetail,
    Key(KeyEvent),
}

/// 事件处理器：持有 cmd_tx，poll 时读键盘并返回 AppEvent
pub struct EventHandler {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl EventHandler {
    pub fn new(cmd_tx: mpsc::UnboundedSender<Command>) -> Self {
        Self { cmd_tx }
    }

    pub fn poll(&self) -> anyhow::Result<Option<AppEvent>> {
        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    return Ok(Some(self.handle_key(key)));
                }
            }
        }
        Ok(None)
    }

    fn handle_key(&self, key: KeyEvent) -> AppEvent {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('q') if ctrl => AppEvent::Command(Command::Quit),
            KeyCode::Char('r') if ctrl => {
                let _ = self.cmd_tx.send(Command::Reset);
                AppEvent::Command(Command::Reset)
            }
            KeyCode::Char('o') if ctrl => {
                let _ = self.cmd_tx.send(Command::Logout);
                AppEvent::Command(Command::Logout)
            }
            KeyCode::Char('t') if ctrl => AppEvent::ToggleDetail,
            _ => AppEvent::Key(key),
        }
    }

    pub fn send_submit(&self, input: String) {
        let _ = self.cmd_tx.send(Command::Submit(input));
    }

    pub fn send_login(&self, token: String) {
        let _ = self.cmd_tx.send(Command::Login(token));
    }

    pub fn send_quit(&self) {
        let _ = self.cmd_tx.send(Command::Quit);
    }
}

//! 状态定义：UiState 投影
//!
//! UI 只持有轻量的 UiState；会话与登录状态由编排器独占维护并投影到 UiState。

use serde::Serialize;

use crate::auth::Identity;
use crate::citations::CitationEntry;
use crate::session::Message;
use crate::trace::TraceView;

/// UI 看到的「投影」状态，轻量且易于渲染
#[derive(Clone, Debug, Default, Serialize)]
pub struct UiState {
    pub phase: ChatPhase,
    /// None 表示未登录，渲染登录页
    pub user: Option<Identity>,
    pub history: Vec<Message>,
    pub input_locked: bool,
    pub error_message: Option<String>,
    /// 登出、超时等提示
    pub notice: Option<String>,
    pub trace: TraceView,
    pub citations: Vec<CitationEntry>,
    pub login_url: Option<String>,
    pub title: String,
    pub icon: Option<String>,
}

impl UiState {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// 标题栏文字：有图标时放在标题前
    pub fn heading(&self) -> String {
        match self.icon.as_deref().filter(|i| !i.is_empty()) {
            Some(icon) => format!("{} {}", icon, self.title),
            None => self.title.clone(),
        }
    }
}


/// 对话阶段（UI 投影用）
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum ChatPhase {
    #[default]
    Idle,
    /// 等待 Agent 回复，输入锁定
    Waiting,
    Error,
}

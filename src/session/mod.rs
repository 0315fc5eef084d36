//! 对话会话：会话 ID、只追加的消息日志，以及最近一轮的引用与 trace
//!
//! 会话对象显式传给每个处理函数；重置即整体替换为新会话（新 ID）。登录状态不在这里，见 `auth`。

pub mod conversation;

use crate::citations::{CitationEntry, DisplayKey, NumberingMode, Reference};
use crate::trace::TraceView;

pub use conversation::{ConversationLog, Message, Role};

/// 一轮回复处理后的全部结果，由 `ChatSession::record_turn` 写入
#[derive(Clone, Debug, PartialEq)]
pub struct TurnOutcome {
    pub content: String,
    pub mode: NumberingMode,
    pub citation_keys: Vec<DisplayKey>,
    pub references: Vec<Reference>,
    pub citations: Vec<CitationEntry>,
    pub trace: TraceView,
}

#[derive(Clone, Debug)]
pub struct ChatSession {
    id: String,
    log: ConversationLog,
    numbering_mode: NumberingMode,
    last_citation_keys: Vec<DisplayKey>,
    last_references: Vec<Reference>,
    last_citations: Vec<CitationEntry>,
    last_trace: TraceView,
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            log: ConversationLog::new(),
            numbering_mode: NumberingMode::Sequential,
            last_citation_keys: Vec::new(),
            last_references: Vec::new(),
            last_citations: Vec::new(),
            last_trace: TraceView::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn messages(&self) -> &[Message] {
        self.log.messages()
    }

    pub fn numbering_mode(&self) -> NumberingMode {
        self.numbering_mode
    }

    pub fn last_citation_keys(&self) -> &[DisplayKey] {
        &self.last_citation_keys
    }

    pub fn last_references(&self) -> &[Reference] {
        &self.last_references
    }

    pub fn last_citations(&self) -> &[CitationEntry] {
        &self.last_citations
    }

    pub fn last_trace(&self) -> &TraceView {
        &self.last_trace
    }

    pub fn push_user(&mut self, prompt: impl Into<String>) {
        self.log.push(Message::user(prompt));
    }

    /// 追加助手回复，并覆盖「最近一轮」的引用与 trace
    pub fn record_turn(&mut self, outcome: TurnOutcome) {
        self.log.push(Message::assistant(outcome.content));
        self.numbering_mode = outcome.mode;
        self.last_citation_keys = outcome.citation_keys;
        self.last_references = outcome.references;
        self.last_citations = outcome.citations;
        self.last_trace = outcome.trace;
    }

    /// 开始新对话：新 ID，清空日志与最近一轮数据
    pub fn reset(&mut self) {
        tracing::info!(old_session = %self.id, "Resetting chat session");
        *self = Self::new();
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

//! 远端 Agent 调用抽象
//!
//! 所有后端（HTTP 转发 / Mock）实现 AgentClient：一次请求返回完整载荷（正文、引用分组、trace）。
//! 本层不重试、不设超时以外的策略，失败直接返回给调用方。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::citations::CitationGroup;
use crate::trace::TraceMap;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Agent request failed: {0}")]
    Transport(String),

    #[error("Agent returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Agent payload decode failed: {0}")]
    Decode(String),

    #[error("Agent not configured: {0}")]
    NotConfigured(String),
}

/// 一次调用的参数
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRequest {
    pub agent_id: String,
    pub agent_alias_id: String,
    pub session_id: String,
    pub input_text: String,
}

/// Agent 返回的原始载荷
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    pub output_text: String,
    #[serde(default)]
    pub citations: Vec<CitationGroup>,
    #[serde(default)]
    pub trace: TraceMap,
}

#[async_trait]
pub trait AgentClient: Send + Sync {
    async fn invoke(&self, request: &AgentRequest) -> Result<AgentResponse, AgentError>;
}

//! Agent 层：调用抽象与实现（HTTP 转发 / Mock）

pub mod http;
pub mod mock;
pub mod traits;

use std::sync::Arc;

pub use http::HttpAgentClient;
pub use mock::MockAgentClient;
pub use traits::{AgentClient, AgentError, AgentRequest, AgentResponse};

use crate::config::AgentSection;

/// 根据配置选择后端：配置了 endpoint 用 HTTP 转发，否则用 Mock
pub fn create_agent_client(cfg: &AgentSection) -> Arc<dyn AgentClient> {
    match cfg.endpoint.as_deref().filter(|e| !e.is_empty()) {
        Some(endpoint) => {
            tracing::info!("Using HTTP agent relay ({})", endpoint);
            Arc::new(HttpAgentClient::new(endpoint, cfg.request_timeout_secs))
        }
        None => {
            tracing::warn!("No agent endpoint configured, using Mock agent");
            Arc::new(MockAgentClient::new())
        }
    }
}

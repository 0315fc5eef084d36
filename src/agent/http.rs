//! HTTP 转发客户端
//!
//! 将调用参数以 JSON POST 到配置的转发端点（由该服务负责签名并调用托管的 Agent 运行时），
//! 端点返回完整载荷：`{"outputText", "citations", "trace"}`。

use async_trait::async_trait;
use reqwest::Client;

use crate::agent::{AgentClient, AgentError, AgentRequest, AgentResponse};

/// 错误响应体在错误信息中保留的最大字符数
const MAX_ERROR_BODY_CHARS: usize = 300;

pub struct HttpAgentClient {
    client: Client,
    endpoint: String,
}

impl HttpAgentClient {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn invoke(&self, request: &AgentRequest) -> Result<AgentResponse, AgentError> {
        if request.agent_id.is_empty() {
            return Err(AgentError::NotConfigured("agent.agent_id".into()));
        }
        tracing::debug!(
            agent_id = %request.agent_id,
            session_id = %request.session_id,
            "Invoking agent via {}",
            self.endpoint
        );
        let resp = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| AgentError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        resp.json::<AgentResponse>()
            .await
            .map_err(|e| AgentError::Decode(e.to_string()))
    }
}

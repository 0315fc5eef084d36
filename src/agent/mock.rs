//! Mock Agent 客户端（用于测试与本地运行，无需远端服务）
//!
//! 回显用户输入，附带一条网页引用与一个 orchestration 步骤，便于跑通引用与 trace 流程。
//! 也可用 `with_response` 固定返回预置载荷。

use async_trait::async_trait;
use serde_json::json;

use crate::agent::{AgentClient, AgentError, AgentRequest, AgentResponse};
use crate::citations::CitationGroup;
use crate::trace::TraceMap;

#[derive(Debug, Default)]
pub struct MockAgentClient {
    canned: Option<AgentResponse>,
}

impl MockAgentClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(response: AgentResponse) -> Self {
        Self {
            canned: Some(response),
        }
    }
}

#[async_trait]
impl AgentClient for MockAgentClient {
    async fn invoke(&self, request: &AgentRequest) -> Result<AgentResponse, AgentError> {
        if let Some(canned) = &self.canned {
            return Ok(canned.clone());
        }

        let text = format!("Echo from Mock: {}", request.input_text);
        let citation = CitationGroup {
            generated_response_part: json!({"textResponsePart": {"text": text}}),
            retrieved_references: vec![json!({
                "content": {"text": request.input_text},
                "location": {"type": "WEB", "webLocation": {"url": "https://example.com/mock"}}
            })],
        };
        let trace_id = format!("{}-0", request.session_id);
        let mut trace = TraceMap::new();
        trace.insert(
            "orchestrationTrace".to_string(),
            vec![
                json!({"modelInvocationInput": {"traceId": trace_id, "text": request.input_text}}),
                json!({"rationale": {"traceId": trace_id, "text": "Echo the user input."}}),
            ],
        );

        Ok(AgentResponse {
            output_text: text,
            citations: vec![citation],
            trace,
        })
    }
}

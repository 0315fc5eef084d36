//! 单轮处理流水线
//!
//! Agent 原始载荷 → 拆信封得到展示文本与编号方式 → 重编号并解析引用定位 → 追加引用列表；
//! trace 段独立聚合为步骤视图。整个过程同步完成，不跨轮交错。

use crate::agent::{AgentClient, AgentError, AgentRequest, AgentResponse};
use crate::citations::{append_reference_list, extract_display_text, renumber, ParseOptions};
use crate::session::TurnOutcome;
use crate::trace::TraceAggregator;

/// 纯函数：把一次 Agent 载荷转成本轮结果
pub fn process_response(response: &AgentResponse, aggregator: &TraceAggregator) -> TurnOutcome {
    let shown = extract_display_text(&response.output_text, ParseOptions::LENIENT);
    let renumbered = renumber(&shown.text, shown.mode, &response.citations);
    let content = append_reference_list(&renumbered.text, &renumbered.references);
    let trace = aggregator.aggregate(&response.trace);

    tracing::debug!(
        mode = ?shown.mode,
        references = renumbered.references.len(),
        retrieved = renumbered.entries.len(),
        trace_steps = trace.step_count(),
        "Processed agent response"
    );

    TurnOutcome {
        content,
        mode: shown.mode,
        citation_keys: renumbered.citation_keys,
        references: renumbered.references,
        citations: renumbered.entries,
        trace,
    }
}

/// 调用 Agent 并处理载荷；Agent 调用是唯一的等待点
pub async fn run_turn(
    client: &dyn AgentClient,
    request: &AgentRequest,
    aggregator: &TraceAggregator,
) -> Result<TurnOutcome, AgentError> {
    let response = client.invoke(request).await?;
    Ok(process_response(&response, aggregator))
}

//! Trace 聚合：把 Agent 返回的各类 trace 记录按关联 ID（traceId）归并成「步骤」
//!
//! 阶段顺序固定为 Pre-Processing → Orchestration → Post-Processing，
//! 每个阶段内按声明顺序扫描各 trace 类型；步骤编号在三个阶段间共用一个计数器。
//! 关联 ID 的作用域是阶段：同一阶段内相同 traceId 的记录归入同一步骤。

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

/// Agent 返回的 trace 段：trace 类型名（如 "orchestrationTrace"）-> 原始记录列表
pub type TraceMap = HashMap<String, Vec<Value>>;

/// Agent 处理阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    PreProcessing,
    Orchestration,
    PostProcessing,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::PreProcessing, Phase::Orchestration, Phase::PostProcessing];

    pub fn label(self) -> &'static str {
        match self {
            Phase::PreProcessing => "Pre-Processing",
            Phase::Orchestration => "Orchestration",
            Phase::PostProcessing => "Post-Processing",
        }
    }
}

/// traceId 在记录中的位置
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdLocation {
    /// 依次查找这些子类型键，第一个存在的 `record[subtype].traceId` 即为关联 ID
    Subtypes(&'static [&'static str]),
    /// 记录顶层的 `traceId`（guardrail 类）；事件载荷包装为 `{trace_type: record}`
    TopLevel,
}

/// 一个 trace 类型及其关联 ID 的取法
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraceSource {
    pub trace_type: &'static str,
    pub id_location: IdLocation,
}

/// 每个阶段包含哪些 trace 类型（有序）
#[derive(Clone, Debug)]
pub struct CorrelationTable {
    phases: Vec<(Phase, Vec<TraceSource>)>,
}

impl CorrelationTable {
    pub fn new(phases: Vec<(Phase, Vec<TraceSource>)>) -> Self {
        Self { phases }
    }

    pub fn sources(&self, phase: Phase) -> &[TraceSource] {
        self.phases
            .iter()
            .find(|(p, _)| *p == phase)
            .map(|(_, s)| s.as_slice())
            .unwrap_or(&[])
    }
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self::new(vec![
            (
                Phase::PreProcessing,
                vec![
                    TraceSource {
                        trace_type: "preGuardrailTrace",
                        id_location: IdLocation::TopLevel,
                    },
                    TraceSource {
                        trace_type: "preProcessingTrace",
                        id_location: IdLocation::Subtypes(&["modelInvocationInput", "modelInvocationOutput"]),
                    },
                ],
            ),
            (
                Phase::Orchestration,
                vec![TraceSource {
                    trace_type: "orchestrationTrace",
                    id_location: IdLocation::Subtypes(&[
                        "invocationInput",
                        "modelInvocationInput",
                        "modelInvocationOutput",
                        "observation",
                        "rationale",
                    ]),
                }],
            ),
            (
                Phase::PostProcessing,
                vec![
                    TraceSource {
                        trace_type: "postProcessingTrace",
                        id_location: IdLocation::Subtypes(&[
                            "modelInvocationInput",
                            "modelInvocationOutput",
                            "observation",
                        ]),
                    },
                    TraceSource {
                        trace_type: "postGuardrailTrace",
                        id_location: IdLocation::TopLevel,
                    },
                ],
            ),
        ])
    }
}

/// 单条 trace 事件
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEvent {
    pub phase: Phase,
    pub subtype: String,
    pub correlation_id: String,
    pub payload: Value,
}

/// 一个步骤：共享同一关联 ID 的事件
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceStep {
    pub step_number: usize,
    pub correlation_id: String,
    pub events: Vec<TraceEvent>,
}

/// 单个阶段的聚合结果；没有任何事件时为 Empty
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "steps", rename_all = "snake_case")]
pub enum PhaseTrace {
    Empty,
    Steps(Vec<TraceStep>),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PhaseSteps {
    pub phase: Phase,
    pub trace: PhaseTrace,
}

/// 一轮回复的完整 trace 视图（三个阶段，固定顺序）
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TraceView {
    pub phases: Vec<PhaseSteps>,
}

impl TraceView {
    /// 按编号顺序遍历所有步骤
    pub fn steps(&self) -> impl Iterator<Item = &TraceStep> {
        self.phases.iter().flat_map(|p| match &p.trace {
            PhaseTrace::Empty => &[] as &[TraceStep],
            PhaseTrace::Steps(steps) => steps.as_slice(),
        })
    }

    pub fn step_count(&self) -> usize {
        self.steps().count()
    }
}

/// 按关联表把 TraceMap 聚合为 TraceView
#[derive(Clone, Debug, Default)]
pub struct TraceAggregator {
    table: CorrelationTable,
}

impl TraceAggregator {
    pub fn new(table: CorrelationTable) -> Self {
        Self { table }
    }

    pub fn aggregate(&self, trace: &TraceMap) -> TraceView {
        let mut next_step = 1;
        let phases = Phase::ALL
            .into_iter()
            .map(|phase| {
                let events = self.phase_events(phase, trace);
                let trace = if events.is_empty() {
                    PhaseTrace::Empty
                } else {
                    PhaseTrace::Steps(group_into_steps(events, &mut next_step))
                };
                PhaseSteps { phase, trace }
            })
            .collect();
        TraceView { phases }
    }

    /// 一个阶段的事件流：按声明顺序拼接各 trace 类型的记录
    fn phase_events(&self, phase: Phase, trace: &TraceMap) -> Vec<TraceEvent> {
        let mut events = Vec::new();
        for source in self.table.sources(phase) {
            let Some(records) = trace.get(source.trace_type) else {
                continue;
            };
            for record in records {
                match correlate(source, record) {
                    Some((subtype, correlation_id, payload)) => events.push(TraceEvent {
                        phase,
                        subtype,
                        correlation_id,
                        payload,
                    }),
                    None => tracing::debug!(
                        trace_type = source.trace_type,
                        "Dropping trace record without traceId"
                    ),
                }
            }
        }
        events
    }
}

/// 取出 (子类型, 关联 ID, 载荷)
fn correlate(source: &TraceSource, record: &Value) -> Option<(String, String, Value)> {
    match source.id_location {
        IdLocation::Subtypes(subtypes) => {
            let subtype = subtypes.iter().find(|s| record.get(**s).is_some())?;
            let id = record.get(*subtype)?.get("traceId")?.as_str()?;
            Some((subtype.to_string(), id.to_string(), record.clone()))
        }
        IdLocation::TopLevel => {
            let id = record.get("traceId")?.as_str()?;
            let mut wrapped = serde_json::Map::new();
            wrapped.insert(source.trace_type.to_string(), record.clone());
            Some((
                source.trace_type.to_string(),
                id.to_string(),
                Value::Object(wrapped),
            ))
        }
    }
}

/// 首次出现的关联 ID 新建步骤并取号，之后的同 ID 事件追加到该步骤
fn group_into_steps(events: Vec<TraceEvent>, next_step: &mut usize) -> Vec<TraceStep> {
    let mut steps: Vec<TraceStep> = Vec::new();
    let mut index_by_id: HashMap<String, usize> = HashMap::new();
    for event in events {
        match index_by_id.get(&event.correlation_id) {
            Some(&i) => steps[i].events.push(event),
            None => {
                index_by_id.insert(event.correlation_id.clone(), steps.len());
                steps.push(TraceStep {
                    step_number: *next_step,
                    correlation_id: event.correlation_id.clone(),
                    events: vec![event],
                });
                *next_step += 1;
            }
        }
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn trace_map(entries: Vec<(&str, Vec<Value>)>) -> TraceMap {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn steps_of(view: &TraceView, phase: Phase) -> &PhaseTrace {
        &view.phases.iter().find(|p| p.phase == phase).unwrap().trace
    }

    #[test]
    fn test_orchestration_and_post_processing_steps() {
        let trace = trace_map(vec![
            (
                "orchestrationTrace",
                vec![
                    json!({"modelInvocationInput": {"traceId": "t-0", "text": "prompt"}}),
                    json!({"rationale": {"traceId": "t-0", "text": "because"}}),
                ],
            ),
            (
                "postProcessingTrace",
                vec![json!({"modelInvocationOutput": {"traceId": "t-post-0"}})],
            ),
        ]);
        let view = TraceAggregator::default().aggregate(&trace);

        assert_eq!(view.step_count(), 2);
        let steps: Vec<&TraceStep> = view.steps().collect();
        assert_eq!(steps[0].step_number, 1);
        assert_eq!(steps[0].correlation_id, "t-0");
        assert_eq!(steps[0].events.len(), 2);
        assert_eq!(steps[0].events[0].subtype, "modelInvocationInput");
        assert_eq!(steps[0].events[1].subtype, "rationale");
        assert_eq!(steps[1].step_number, 2);
        assert_eq!(steps[1].events[0].phase, Phase::PostProcessing);
        assert_eq!(steps_of(&view, Phase::PreProcessing), &PhaseTrace::Empty);
    }

    #[test]
    fn test_empty_trace_yields_three_empty_phases() {
        let view = TraceAggregator::default().aggregate(&TraceMap::new());
        assert_eq!(view.phases.len(), 3);
        assert!(view.phases.iter().all(|p| p.trace == PhaseTrace::Empty));
        let order: Vec<Phase> = view.phases.iter().map(|p| p.phase).collect();
        assert_eq!(order, Phase::ALL);
    }

    #[test]
    fn test_first_matching_subtype_decides_id() {
        let trace = trace_map(vec![(
            "orchestrationTrace",
            vec![json!({
                "invocationInput": {"traceId": "a"},
                "observation": {"traceId": "b"}
            })],
        )]);
        let view = TraceAggregator::default().aggregate(&trace);
        let step = view.steps().next().unwrap();
        assert_eq!(step.correlation_id, "a");
        assert_eq!(step.events[0].subtype, "invocationInput");
    }

    #[test]
    fn test_numbering_runs_across_phases_in_fixed_order() {
        // HashMap 的插入顺序不影响结果
        let trace = trace_map(vec![
            ("postGuardrailTrace", vec![json!({"traceId": "g-post", "action": "NONE"})]),
            ("orchestrationTrace", vec![
                json!({"modelInvocationInput": {"traceId": "o-1"}}),
                json!({"modelInvocationInput": {"traceId": "o-2"}}),
                json!({"observation": {"traceId": "o-1"}}),
            ]),
            ("preProcessingTrace", vec![json!({"modelInvocationOutput": {"traceId": "p-1"}})]),
            ("preGuardrailTrace", vec![json!({"traceId": "g-pre"})]),
        ]);
        let view = TraceAggregator::default().aggregate(&trace);
        let ids: Vec<(usize, &str, usize)> = view
            .steps()
            .map(|s| (s.step_number, s.correlation_id.as_str(), s.events.len()))
            .collect();
        assert_eq!(
            ids,
            vec![(1, "g-pre", 1), (2, "p-1", 1), (3, "o-1", 2), (4, "o-2", 1), (5, "g-post", 1)]
        );
    }

    #[test]
    fn test_guardrail_payload_is_wrapped_by_trace_type() {
        let trace = trace_map(vec![("preGuardrailTrace", vec![json!({"traceId": "g"})])]);
        let view = TraceAggregator::default().aggregate(&trace);
        let event = &view.steps().next().unwrap().events[0];
        assert_eq!(event.payload, json!({"preGuardrailTrace": {"traceId": "g"}}));
    }

    #[test]
    fn test_records_without_id_are_dropped() {
        let trace = trace_map(vec![(
            "orchestrationTrace",
            vec![json!({"unknownSubtype": {"traceId": "x"}}), json!({"rationale": {"text": "no id"}})],
        )]);
        let view = TraceAggregator::default().aggregate(&trace);
        assert_eq!(steps_of(&view, Phase::Orchestration), &PhaseTrace::Empty);
    }

    #[test]
    fn test_same_id_in_two_phases_gets_a_step_in_each() {
        let trace = trace_map(vec![
            ("preProcessingTrace", vec![json!({"modelInvocationInput": {"traceId": "same"}})]),
            ("orchestrationTrace", vec![json!({"modelInvocationInput": {"traceId": "same"}})]),
        ]);
        let view = TraceAggregator::default().aggregate(&trace);
        let numbers: Vec<usize> = view.steps().map(|s| s.step_number).collect();
        assert_eq!(numbers, [1, 2]);
    }
}

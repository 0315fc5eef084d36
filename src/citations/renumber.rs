//! 引用重编号
//!
//! MarkerTagged 模式下先一次线性扫描得到全部 `%[n]%` 标注，再分两步纯函数处理：
//! 改写正文、收集编号。第 i 条检索引用的展示编号为第 i 个标注的数字；
//! 标注不足时，多出的引用从「已用最大编号 + 1」起顺延。

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

use super::location::{resolve_reference, Resolution};
use super::{CitationEntry, CitationGroup, DisplayKey, NumberingMode, Reference};

static MARKER_RE: OnceLock<Regex> = OnceLock::new();

/// 正文中的一个 `%[n]%` 标注
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkerMatch {
    pub range: Range<usize>,
    pub number: String,
}

/// 重编号结果（正文尚未追加引用列表）
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Renumbered {
    pub text: String,
    /// 标注中的编号，按出现顺序（Sequential 模式为空）
    pub citation_keys: Vec<DisplayKey>,
    /// 去重后的引用，按编号数值升序
    pub references: Vec<Reference>,
    pub entries: Vec<CitationEntry>,
}

fn marker_re() -> &'static Regex {
    MARKER_RE.get_or_init(|| Regex::new(r"%\[(\d+)\]%").expect("static regex"))
}

/// 从左到右扫描全部标注
pub fn scan_markers(text: &str) -> Vec<MarkerMatch> {
    marker_re()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let digits = caps.get(1)?;
            Some(MarkerMatch {
                range: whole.range(),
                number: digits.as_str().to_string(),
            })
        })
        .collect()
}

/// 上标样式的行内编号
pub fn superscript(key: &str) -> String {
    format!("^[{key}]")
}

/// 按扫描结果逐个替换为上标编号，其余文本原样拷贝
pub fn rewrite_markers(text: &str, markers: &[MarkerMatch]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for m in markers {
        out.push_str(&text[cursor..m.range.start]);
        out.push_str(&superscript(&m.number));
        cursor = m.range.end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// 为 `count` 条检索引用分配展示编号
pub fn assign_display_keys(
    mode: NumberingMode,
    marker_keys: &[DisplayKey],
    count: usize,
) -> Vec<DisplayKey> {
    match mode {
        NumberingMode::Sequential => (1..=count).map(DisplayKey::sequential).collect(),
        NumberingMode::MarkerTagged => {
            let mut next = marker_keys
                .iter()
                .filter_map(DisplayKey::numeric)
                .max()
                .unwrap_or(0)
                .saturating_add(1);
            if count > marker_keys.len() {
                tracing::debug!(
                    markers = marker_keys.len(),
                    references = count,
                    "Fewer citation markers than retrieved references, continuing from {}",
                    next
                );
            }
            (0..count)
                .map(|i| match marker_keys.get(i) {
                    Some(key) => key.clone(),
                    None => {
                        let key = DisplayKey::from_marker(next.to_string());
                        next = next.saturating_add(1);
                        key
                    }
                })
                .collect()
        }
    }
}

/// 改写正文并为所有检索引用编号、去重、解析定位
///
/// 同一编号的第一条可解析引用决定定位；无法解析的引用只记诊断日志，不进入列表。
pub fn renumber(text: &str, mode: NumberingMode, groups: &[CitationGroup]) -> Renumbered {
    let (text, citation_keys) = match mode {
        NumberingMode::MarkerTagged => {
            let markers = scan_markers(text);
            let keys = markers
                .iter()
                .map(|m| DisplayKey::from_marker(m.number.clone()))
                .collect();
            (rewrite_markers(text, &markers), keys)
        }
        NumberingMode::Sequential => (text.to_string(), Vec::new()),
    };

    let retrieved: Vec<_> = groups
        .iter()
        .flat_map(|g| {
            g.retrieved_references
                .iter()
                .map(move |r| (&g.generated_response_part, r))
        })
        .collect();
    let keys = assign_display_keys(mode, &citation_keys, retrieved.len());

    let mut resolved: BTreeMap<DisplayKey, Reference> = BTreeMap::new();
    let mut counts: HashMap<DisplayKey, usize> = HashMap::new();
    let mut entries = Vec::with_capacity(retrieved.len());

    for (index, ((part, reference), key)) in retrieved.into_iter().zip(keys).enumerate() {
        let occurrence = {
            let c = counts.entry(key.clone()).or_insert(0);
            *c += 1;
            *c
        };

        if !resolved.contains_key(&key) {
            match resolve_reference(reference) {
                Resolution::Resolved {
                    source_type,
                    locator,
                } => {
                    resolved.insert(
                        key.clone(),
                        Reference {
                            key: key.clone(),
                            source_type,
                            locator,
                            occurrence_index: index,
                            occurrences: 0,
                        },
                    );
                }
                Resolution::Unresolved(reason) => {
                    tracing::warn!(key = %key, index, "Skipping citation reference: {}", reason);
                }
            }
        }

        entries.push(CitationEntry {
            display_key: key,
            occurrence,
            generated_response_part: part.clone(),
            retrieved_reference: reference.clone(),
        });
    }

    let references = resolved
        .into_values()
        .map(|mut r| {
            r.occurrences = counts.get(&r.key).copied().unwrap_or(1);
            r
        })
        .collect();

    Renumbered {
        text,
        citation_keys,
        references,
        entries,
    }
}

/// 在正文末尾追加引用列表：空一行后每个编号一行 `[k] locator`
pub fn append_reference_list(text: &str, references: &[Reference]) -> String {
    if references.is_empty() {
        return text.to_string();
    }
    let mut out = String::from(text);
    out.push('\n');
    for r in references {
        out.push_str(&format!("\n[{}] {}", r.key, r.locator));
    }
    out
}

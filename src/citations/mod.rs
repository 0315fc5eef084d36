//! 引用处理：信封解析、行内标注重编号、来源定位
//!
//! 一轮回复的处理顺序：`envelope` 得到展示文本与编号方式 → `renumber` 改写行内标注并
//! 为每条检索引用分配展示编号 → `location` 解析定位 → 在正文末尾追加引用列表。

pub mod envelope;
pub mod location;
pub mod renumber;

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use envelope::{extract_display_text, parse_envelope, DisplayText, Envelope, ParseOptions};
pub use location::{resolve, resolve_reference, Resolution, SourceType, UnresolvedReason};
pub use renumber::{append_reference_list, renumber, scan_markers, MarkerMatch, Renumbered};

/// 引用编号方式（每轮重新判定）
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NumberingMode {
    /// 按检索顺序 1, 2, 3...
    #[default]
    Sequential,
    /// 正文中带 `%[n]%` 标注，编号取自标注
    MarkerTagged,
}

/// 一个引用分组：一段生成文本及支撑它的检索引用
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationGroup {
    #[serde(default)]
    pub generated_response_part: Value,
    #[serde(default)]
    pub retrieved_references: Vec<Value>,
}

/// 展示给用户的引用编号；按数值大小排序（数字串可能超出整数范围，故保存原文）
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplayKey(String);

impl DisplayKey {
    pub fn sequential(n: usize) -> Self {
        Self(n.to_string())
    }

    pub fn from_marker(digits: impl Into<String>) -> Self {
        Self(digits.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn numeric(&self) -> Option<u64> {
        self.0.parse().ok()
    }

    fn magnitude(&self) -> &str {
        let trimmed = self.0.trim_start_matches('0');
        if trimmed.is_empty() && !self.0.is_empty() {
            "0"
        } else {
            trimmed
        }
    }
}

impl std::fmt::Display for DisplayKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Ord for DisplayKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = (self.magnitude(), other.magnitude());
        a.len()
            .cmp(&b.len())
            .then_with(|| a.cmp(b))
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for DisplayKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// 去重后的引用（每个展示编号一条）
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub key: DisplayKey,
    pub source_type: SourceType,
    pub locator: String,
    /// 决定定位的那条检索引用在本轮所有检索引用中的位置
    pub occurrence_index: usize,
    /// 映射到该编号的检索引用总数
    pub occurrences: usize,
}

/// 侧栏展示用：每条检索引用一项，标明是该编号的第几次出现
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationEntry {
    pub display_key: DisplayKey,
    pub occurrence: usize,
    pub generated_response_part: Value,
    pub retrieved_reference: Value,
}

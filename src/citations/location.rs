//! 引用来源定位：根据 location.type 取出对应的 URL / 文档 ID / URI / 查询语句
//!
//! 来源类型是封闭集合，新增类型只需在 `SourceType` 与 `locator_field` 中各加一个分支。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 检索引用的来源类型（与 Agent 返回的 location.type 一一对应）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    Confluence,
    Custom,
    Kendra,
    S3,
    Salesforce,
    Sharepoint,
    Sql,
    Web,
}

impl SourceType {
    pub const ALL: [SourceType; 8] = [
        SourceType::Confluence,
        SourceType::Custom,
        SourceType::Kendra,
        SourceType::S3,
        SourceType::Salesforce,
        SourceType::Sharepoint,
        SourceType::Sql,
        SourceType::Web,
    ];

    /// 线上标签，如 "CONFLUENCE"、"S3"
    pub fn tag(self) -> &'static str {
        match self {
            SourceType::Confluence => "CONFLUENCE",
            SourceType::Custom => "CUSTOM",
            SourceType::Kendra => "KENDRA",
            SourceType::S3 => "S3",
            SourceType::Salesforce => "SALESFORCE",
            SourceType::Sharepoint => "SHAREPOINT",
            SourceType::Sql => "SQL",
            SourceType::Web => "WEB",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    /// (子对象键, 字段名)：定位字符串所在位置
    pub fn locator_field(self) -> (&'static str, &'static str) {
        match self {
            SourceType::Confluence => ("confluenceLocation", "url"),
            SourceType::Custom => ("customDocumentLocation", "id"),
            SourceType::Kendra => ("kendraDocumentLocation", "uri"),
            SourceType::S3 => ("s3Location", "uri"),
            SourceType::Salesforce => ("salesforceLocation", "url"),
            SourceType::Sharepoint => ("sharePointLocation", "url"),
            SourceType::Sql => ("sqlLocation", "query"),
            SourceType::Web => ("webLocation", "url"),
        }
    }
}

/// 无法解析的原因（仅用于诊断日志，不会让整轮失败）
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnresolvedReason {
    MissingType,
    UnknownType(String),
    MissingField {
        source_type: SourceType,
        field: &'static str,
    },
}

impl std::fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnresolvedReason::MissingType => write!(f, "location has no type"),
            UnresolvedReason::UnknownType(tag) => write!(f, "unknown location type: {tag}"),
            UnresolvedReason::MissingField { source_type, field } => {
                let (object, _) = source_type.locator_field();
                write!(f, "{} location missing {object}.{field}", source_type.tag())
            }
        }
    }
}

/// 解析结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Resolved {
        source_type: SourceType,
        locator: String,
    },
    Unresolved(UnresolvedReason),
}

/// 按类型标签与该类型的载荷解析定位字符串；`location` 为完整的 location 对象
pub fn resolve(tag: &str, location: &Value) -> Resolution {
    let Some(source_type) = SourceType::from_tag(tag) else {
        return Resolution::Unresolved(UnresolvedReason::UnknownType(tag.to_string()));
    };
    let (object, field) = source_type.locator_field();
    match location
        .get(object)
        .and_then(|o| o.get(field))
        .and_then(Value::as_str)
    {
        Some(locator) => Resolution::Resolved {
            source_type,
            locator: locator.to_string(),
        },
        None => Resolution::Unresolved(UnresolvedReason::MissingField { source_type, field }),
    }
}

/// 解析一条 retrievedReference：读取其 location.type 后交给 `resolve`
pub fn resolve_reference(retrieved_reference: &Value) -> Resolution {
    let location = retrieved_reference.get("location").unwrap_or(&Value::Null);
    match location.get("type").and_then(Value::as_str) {
        Some(tag) => resolve(tag, location),
        None => Resolution::Unresolved(UnresolvedReason::MissingType),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_each_known_type() {
        let cases = [
            (json!({"type": "CONFLUENCE", "confluenceLocation": {"url": "https://c/1"}}), "https://c/1"),
            (json!({"type": "CUSTOM", "customDocumentLocation": {"id": "doc-9"}}), "doc-9"),
            (json!({"type": "KENDRA", "kendraDocumentLocation": {"uri": "kendra://x"}}), "kendra://x"),
            (json!({"type": "S3", "s3Location": {"uri": "s3://bucket/a.pdf"}}), "s3://bucket/a.pdf"),
            (json!({"type": "SALESFORCE", "salesforceLocation": {"url": "https://sf/1"}}), "https://sf/1"),
            (json!({"type": "SHAREPOINT", "sharePointLocation": {"url": "https://sp/1"}}), "https://sp/1"),
            (json!({"type": "SQL", "sqlLocation": {"query": "SELECT 1"}}), "SELECT 1"),
            (json!({"type": "WEB", "webLocation": {"url": "https://example.com"}}), "https://example.com"),
        ];
        for (location, expected) in cases {
            let tag = location["type"].as_str().unwrap();
            match resolve(tag, &location) {
                Resolution::Resolved { locator, source_type } => {
                    assert_eq!(locator, expected);
                    assert_eq!(source_type.tag(), tag);
                }
                other => panic!("expected resolved for {tag}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_unknown_type_is_unresolved() {
        let location = json!({"type": "FTP", "ftpLocation": {"url": "ftp://x"}});
        assert_eq!(
            resolve("FTP", &location),
            Resolution::Unresolved(UnresolvedReason::UnknownType("FTP".into()))
        );
    }

    #[test]
    fn test_missing_field_is_unresolved() {
        let location = json!({"type": "S3", "s3Location": {}});
        assert!(matches!(
            resolve("S3", &location),
            Resolution::Unresolved(UnresolvedReason::MissingField { source_type: SourceType::S3, field: "uri" })
        ));
    }

    #[test]
    fn test_resolve_reference_reads_nested_location() {
        let reference = json!({
            "content": {"text": "..."},
            "location": {"type": "WEB", "webLocation": {"url": "https://w"}}
        });
        assert!(matches!(resolve_reference(&reference), Resolution::Resolved { .. }));
        assert_eq!(
            resolve_reference(&json!({"content": {}})),
            Resolution::Unresolved(UnresolvedReason::MissingType)
        );
    }

    #[test]
    fn test_tag_round_trip_matches_serde() {
        for t in SourceType::ALL {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.tag()));
            assert_eq!(SourceType::from_tag(t.tag()), Some(t));
        }
    }
}

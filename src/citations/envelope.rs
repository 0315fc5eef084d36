//! 响应信封解析
//!
//! 部分 Agent 配置（挂载知识库的 Titan 模型）不直接返回正文，而是返回
//! `{"instruction": ..., "result": ...}` JSON。这里尝试拆开信封，失败时原样回退。
//! 模型输出的 JSON 常带有未转义的换行等控制字符，解析前先按 `ParseOptions` 修复。

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::NumberingMode;

static INSTRUCTION_MARKER_RE: OnceLock<Regex> = OnceLock::new();

/// 宽松解析选项：显式声明容忍哪些不规范写法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// 字符串值内允许出现未转义的控制字符（U+0000..U+001F）
    pub allow_control_chars: bool,
    /// 字符串值内的非法转义（如 `\q`、不足 4 位的 `\u`）按字面反斜杠处理
    pub repair_invalid_escapes: bool,
}

impl ParseOptions {
    pub const STRICT: ParseOptions = ParseOptions {
        allow_control_chars: false,
        repair_invalid_escapes: false,
    };

    pub const LENIENT: ParseOptions = ParseOptions {
        allow_control_chars: true,
        repair_invalid_escapes: true,
    };
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::LENIENT
    }
}

/// 信封解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    /// 成功拆出 instruction 与 result
    Parsed { instruction: String, result: String },
    /// 不是 JSON，或缺少必需字段：使用原始文本
    Fallback,
}

/// 展示文本与本轮的引用编号方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayText {
    pub text: String,
    pub mode: NumberingMode,
}

/// 按选项解析信封；不会返回错误
pub fn parse_envelope(raw: &str, options: ParseOptions) -> Envelope {
    let source = repair_json_strings(raw, options);
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&source) else {
        return Envelope::Fallback;
    };
    match (map.get("instruction"), map.get("result")) {
        (Some(Value::String(instruction)), Some(Value::String(result))) => Envelope::Parsed {
            instruction: instruction.clone(),
            result: result.clone(),
        },
        _ => Envelope::Fallback,
    }
}

/// 原始输出 -> 展示文本 + 编号方式
pub fn extract_display_text(raw: &str, options: ParseOptions) -> DisplayText {
    match parse_envelope(raw, options) {
        Envelope::Parsed { instruction, result } => {
            let mode = if instruction_uses_markers(&instruction) {
                NumberingMode::MarkerTagged
            } else {
                NumberingMode::Sequential
            };
            tracing::debug!(?mode, "Unwrapped instruction/result envelope");
            DisplayText { text: result, mode }
        }
        Envelope::Fallback => DisplayText {
            text: raw.to_string(),
            mode: NumberingMode::Sequential,
        },
    }
}

/// instruction 中是否要求模型以 `%[n]%` 标注引用（模板里常写作 `%[X]%`）
pub fn instruction_uses_markers(instruction: &str) -> bool {
    INSTRUCTION_MARKER_RE
        .get_or_init(|| Regex::new(r"%\[(?:\d+|X)\]%").expect("static regex"))
        .is_match(instruction)
}

/// 只改写字符串字面量内部；结构字符与字符串外的空白保持不变
fn repair_json_strings(raw: &str, options: ParseOptions) -> Cow<'_, str> {
    if options == ParseOptions::STRICT {
        return Cow::Borrowed(raw);
    }

    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len() + 8);
    let mut in_string = false;
    let mut changed = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            i += 1;
            continue;
        }

        match c {
            '"' => {
                in_string = false;
                out.push(c);
            }
            '\\' => {
                let next = chars.get(i + 1).copied();
                let valid = match next {
                    Some('"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't') => true,
                    Some('u') => chars
                        .get(i + 2..i + 6)
                        .is_some_and(|hex| hex.iter().all(char::is_ascii_hexdigit)),
                    _ => false,
                };
                if valid {
                    out.push(c);
                    if let Some(n) = next {
                        out.push(n);
                    }
                    i += 2;
                    continue;
                }
                if options.repair_invalid_escapes {
                    out.push_str("\\\\");
                    changed = true;
                } else {
                    out.push(c);
                }
            }
            c if (c as u32) < 0x20 && options.allow_control_chars => {
                match c {
                    '\n' => out.push_str("\\n"),
                    '\r' => out.push_str("\\r"),
                    '\t' => out.push_str("\\t"),
                    other => out.push_str(&format!("\\u{:04x}", other as u32)),
                }
                changed = true;
            }
            _ => out.push(c),
        }
        i += 1;
    }

    if changed {
        Cow::Owned(out)
    } else {
        Cow::Borrowed(raw)
    }
}

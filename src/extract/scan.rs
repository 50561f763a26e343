//! Fenced code and embedded JSON scanning over free text

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Language recorded when a fence declares none
pub const DEFAULT_LANGUAGE: &str = "text";

fn fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```[ \t]*([A-Za-z0-9_+#.\-]*)[^\n]*\n(.*?)```")
            .expect("code fence regex is valid")
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlock {
    pub language: Option<String>,
    /// Trimmed body, never empty
    pub body: String,
}

impl CodeBlock {
    pub fn language_or_default(&self) -> &str {
        self.language.as_deref().unwrap_or(DEFAULT_LANGUAGE)
    }
}

/// All triple-backtick fenced regions of `text`, in order.
pub fn find_code_blocks(text: &str) -> Vec<CodeBlock> {
    fence_regex()
        .captures_iter(text)
        .filter_map(|caps| {
            let body = caps.get(2)?.as_str().trim();
            if body.is_empty() {
                return None;
            }
            let language = caps
                .get(1)
                .map(|m| m.as_str())
                .filter(|l| !l.is_empty())
                .map(str::to_string);
            Some(CodeBlock {
                language,
                body: body.to_string(),
            })
        })
        .collect()
}

/// Non-empty JSON objects embedded in `text`.
///
/// One pass over the text pairs braces on a stack, honouring string literals and
/// escapes inside open braces. Each closed pair is decoded; a pair that fails
/// poisons its enclosing pair, which then cannot be valid either. A valid object
/// nested inside invalid text is still found. Objects nested in a kept object are
/// not reported separately.
pub fn find_json_objects(text: &str) -> Vec<Map<String, Value>> {
    // (start byte, poisoned)
    let mut open: Vec<(usize, bool)> = Vec::new();
    let mut kept: Vec<(usize, Map<String, Value>)> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in text.bytes().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' if !open.is_empty() => in_string = true,
            b'{' => open.push((i, false)),
            b'}' => {
                let Some((start, poisoned)) = open.pop() else {
                    continue;
                };
                let decoded = if poisoned {
                    None
                } else {
                    serde_json::from_str::<Value>(&text[start..=i]).ok()
                };
                match decoded {
                    Some(Value::Object(map)) => {
                        if !map.is_empty() {
                            while kept.last().is_some_and(|(s, _)| *s > start) {
                                kept.pop();
                            }
                            kept.push((start, map));
                        }
                    }
                    _ => {
                        if let Some(parent) = open.last_mut() {
                            parent.1 = true;
                        }
                    }
                }
            }
            _ => {}
        }
    }

    kept.into_iter().map(|(_, map)| map).collect()
}

//! Shared parser utilities
//!
//! Hashing, content flattening, conversation statistics, tool summaries and text helpers
//! used by both the parser strategies and the artifact extractor.

use super::types::{ContentBlock, EventLine, MessageContent};
use crate::models::ConversationStats;
use serde_json::Value;
use sha2::{Digest, Sha256};

// ─── Hashing ─────────────────────────────────────────────────────────────────

/// SHA-256 lowercase hex digest of the given text or bytes.
pub fn content_hash(data: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_ref());
    format!("{:x}", hasher.finalize())
}

/// Hash of several parts joined with a separator that cannot occur in UTF-8 text.
pub fn composite_hash(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([0xff_u8]);
        }
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

// ─── Text utilities ──────────────────────────────────────────────────────────

/// Truncate a string at a valid UTF-8 character boundary.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let end = s
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= max_len)
        .last()
        .unwrap_or(0);
    format!("{}...", &s[..end])
}

/// First `max_chars` characters, without an ellipsis.
pub fn head_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Last `max_chars` characters.
pub fn tail_chars(s: &str, max_chars: usize) -> &str {
    let count = s.chars().count();
    if count <= max_chars {
        return s;
    }
    let start = s
        .char_indices()
        .nth(count - max_chars)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &s[start..]
}

/// Strings pass through; any other JSON value is serialized compactly.
pub fn stringify_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ─── Content flattening ──────────────────────────────────────────────────────

/// Render one content block as text.
pub fn render_block(block: &ContentBlock) -> String {
    match block {
        ContentBlock::Text { text } => text.clone(),
        ContentBlock::ToolUse { name, input, .. } => {
            let pretty = serde_json::to_string_pretty(input).unwrap_or_default();
            format!("[Tool: {}]\n{}", name, pretty)
        }
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            ..
        } => format!("[Tool Result: {}]\n{}", tool_use_id, stringify_value(content)),
        ContentBlock::Other => String::new(),
    }
}

/// Flatten message content into a single text value.
pub fn render_content(content: &MessageContent) -> String {
    match content {
        MessageContent::Text(text) => text.clone(),
        MessageContent::Blocks(blocks) => blocks
            .iter()
            .map(render_block)
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Normalized text of an event line (empty when it has no message content).
pub fn line_text(event: &EventLine) -> String {
    event
        .message
        .as_ref()
        .and_then(|m| m.content.as_ref())
        .map(render_content)
        .unwrap_or_default()
}

/// Text-block content only, used when scanning assistant prose for code.
pub fn prose_text(event: &EventLine) -> String {
    match event.message.as_ref().and_then(|m| m.content.as_ref()) {
        Some(MessageContent::Text(text)) => text.clone(),
        Some(MessageContent::Blocks(blocks)) => blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
        None => String::new(),
    }
}

// ─── Stats ───────────────────────────────────────────────────────────────────

/// Derive conversation statistics from stored entry timestamps.
///
/// Unparseable or missing timestamps are ignored for start/end but still count
/// towards the message count.
pub fn calculate_stats(timestamps: &[Option<String>]) -> ConversationStats {
    let parsed: Vec<chrono::DateTime<chrono::Utc>> = timestamps
        .iter()
        .flatten()
        .filter_map(|ts| chrono::DateTime::parse_from_rfc3339(ts).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .collect();

    let start = parsed.iter().min();
    let end = parsed.iter().max();

    ConversationStats {
        started_at: start.map(|t| t.to_rfc3339()),
        ended_at: end.map(|t| t.to_rfc3339()),
        duration_ms: match (start, end) {
            (Some(s), Some(e)) => Some((*e - *s).num_milliseconds()),
            _ => None,
        },
        message_count: timestamps.len() as i64,
    }
}

// ─── Tool summary ────────────────────────────────────────────────────────────

fn file_name(path: &str) -> &str {
    path.split('/').next_back().unwrap_or(path)
}

/// Generate a human-readable summary for a tool invocation.
pub fn generate_tool_summary(tool_name: &str, tool_input: &Value) -> String {
    let field = |key: &str| tool_input.get(key).and_then(|v| v.as_str());

    match tool_name {
        "Bash" | "bash" => field("command")
            .map(|cmd| truncate_str(cmd, 50))
            .unwrap_or_else(|| "Bash command".to_string()),
        "Write" | "write" => field("file_path")
            .map(|p| format!("Write {}", file_name(p)))
            .unwrap_or_else(|| "Writing file".to_string()),
        "Edit" | "edit" | "MultiEdit" => field("file_path")
            .map(|p| format!("Edit {}", file_name(p)))
            .unwrap_or_else(|| "Editing file".to_string()),
        "Read" | "read" => field("file_path")
            .map(|p| format!("Read {}", file_name(p)))
            .unwrap_or_else(|| "Reading file".to_string()),
        "Grep" | "grep" => field("pattern")
            .map(|p| format!("Search: {}", truncate_str(p, 30)))
            .unwrap_or_else(|| "Grep search".to_string()),
        "Glob" | "glob" => field("pattern")
            .map(|p| format!("Files: {}", p))
            .unwrap_or_else(|| "File glob".to_string()),
        "Task" | "task" => field("description")
            .map(|d| truncate_str(d, 50))
            .unwrap_or_else(|| "Task agent".to_string()),
        _ => format!("Used {}", tool_name),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_hash_is_stable_hex() {
        let h = content_hash("hello");
        assert_eq!(h.len(), 64);
        assert_eq!(h, content_hash("hello"));
        assert_ne!(h, content_hash("hello "));
    }

    #[test]
    fn test_composite_hash_separates_parts() {
        assert_ne!(composite_hash(&["ab", "c"]), composite_hash(&["a", "bc"]));
    }

    #[test]
    fn test_truncate_str_multibyte() {
        assert_eq!(truncate_str("hello", 10), "hello");
        let result = truncate_str("héllo wörld", 5);
        assert!(result.ends_with("..."));
    }

    #[test]
    fn test_tail_and_head_chars() {
        assert_eq!(tail_chars("abcdef", 3), "def");
        assert_eq!(tail_chars("ab", 3), "ab");
        assert_eq!(tail_chars("héllo", 4), "éllo");
        assert_eq!(head_chars("héllo", 2), "hé");
    }

    #[test]
    fn test_render_blocks() {
        let content = MessageContent::Blocks(vec![
            ContentBlock::Text {
                text: "Let me look".to_string(),
            },
            ContentBlock::ToolUse {
                id: "t1".to_string(),
                name: "Read".to_string(),
                input: json!({"file_path": "/a.rs"}),
            },
            ContentBlock::Other,
        ]);
        let text = render_content(&content);
        assert!(text.starts_with("Let me look\n[Tool: Read]\n{"));
        assert!(text.contains("\"file_path\": \"/a.rs\""));
    }

    #[test]
    fn test_render_tool_result_stringifies_structures() {
        let block = ContentBlock::ToolResult {
            tool_use_id: "t1".to_string(),
            content: json!([{"type": "text", "text": "ok"}]),
            is_error: false,
        };
        let text = render_block(&block);
        assert!(text.starts_with("[Tool Result: t1]\n["));

        let plain = ContentBlock::ToolResult {
            tool_use_id: "t2".to_string(),
            content: json!("done"),
            is_error: false,
        };
        assert_eq!(render_block(&plain), "[Tool Result: t2]\ndone");
    }

    #[test]
    fn test_calculate_stats() {
        let stats = calculate_stats(&[
            Some("2024-01-01T00:05:00Z".to_string()),
            None,
            Some("2024-01-01T00:00:00Z".to_string()),
            Some("not a time".to_string()),
        ]);
        assert_eq!(stats.message_count, 4);
        assert_eq!(stats.duration_ms, Some(300_000));
        assert!(stats.started_at.unwrap().starts_with("2024-01-01T00:00:00"));
        assert!(stats.ended_at.unwrap().starts_with("2024-01-01T00:05:00"));
    }

    #[test]
    fn test_calculate_stats_without_timestamps() {
        let stats = calculate_stats(&[None]);
        assert_eq!(stats.message_count, 1);
        assert!(stats.started_at.is_none());
        assert!(stats.duration_ms.is_none());
    }

    #[test]
    fn test_generate_tool_summary() {
        assert_eq!(
            generate_tool_summary("Bash", &json!({"command": "ls -la /tmp"})),
            "ls -la /tmp"
        );
        assert_eq!(
            generate_tool_summary("Read", &json!({"file_path": "/src/main.rs"})),
            "Read main.rs"
        );
        assert_eq!(generate_tool_summary("Unknown", &Value::Null), "Used Unknown");
    }
}

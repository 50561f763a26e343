//! Tool invocation / result correlation over decoded event-log lines.

use crate::models::Role;
use crate::parser::common::{line_text, tail_chars};
use crate::parser::{ContentBlock, EventLine};
use serde_json::Value;
use std::collections::HashMap;

/// A tool invocation found in an assistant message
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
    pub line_index: usize,
    pub timestamp: Option<String>,
}

/// The result attached to an invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResultRecord {
    pub content: Value,
    pub is_error: bool,
    pub line_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolExchange {
    pub call: ToolCall,
    /// `None` when no result arrived by end of file
    pub result: Option<ToolResultRecord>,
}

/// Pair every tool invocation with its result by identifier.
///
/// `events` holds `(line_index, event)` in file order. The first invocation of an
/// identifier wins, as does the first result for it. Results whose identifier
/// matches no invocation are dropped.
pub fn correlate(events: &[(usize, EventLine)]) -> Vec<ToolExchange> {
    let mut exchanges: Vec<ToolExchange> = Vec::new();
    let mut by_id: HashMap<&str, usize> = HashMap::new();

    for (line_index, event) in events {
        if event.role() != Role::Assistant {
            continue;
        }
        for block in event.blocks() {
            let ContentBlock::ToolUse { id, name, input } = block else {
                continue;
            };
            if id.is_empty() || by_id.contains_key(id.as_str()) {
                continue;
            }
            by_id.insert(id.as_str(), exchanges.len());
            exchanges.push(ToolExchange {
                call: ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                    line_index: *line_index,
                    timestamp: event.timestamp.clone(),
                },
                result: None,
            });
        }
    }

    for (line_index, event) in events {
        if !matches!(event.role(), Role::User | Role::Tool) {
            continue;
        }
        for block in event.blocks() {
            let ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } = block
            else {
                continue;
            };
            let Some(&slot) = by_id.get(tool_use_id.as_str()) else {
                tracing::debug!("Tool result {} has no matching invocation", tool_use_id);
                continue;
            };
            let exchange = &mut exchanges[slot];
            if exchange.result.is_none() {
                exchange.result = Some(ToolResultRecord {
                    content: content.clone(),
                    is_error: *is_error,
                    line_index: *line_index,
                });
            }
        }
    }

    exchanges
}

/// Ordered entry texts for trailing-context lookups
#[derive(Debug, Default)]
pub struct ContextIndex {
    entries: Vec<(usize, String)>,
}

impl ContextIndex {
    /// Index the rendered text of every accepted, non-empty line.
    pub fn build(events: &[(usize, EventLine)]) -> Self {
        let entries = events
            .iter()
            .filter(|(_, e)| e.is_accepted())
            .map(|(i, e)| (*i, line_text(e)))
            .filter(|(_, text)| !text.trim().is_empty())
            .collect();
        ContextIndex { entries }
    }

    /// Tail of the entry immediately before `line_index`.
    pub fn preceding(&self, line_index: usize, window: usize) -> Option<String> {
        let pos = self.entries.partition_point(|(i, _)| *i < line_index);
        let (_, text) = self.entries.get(pos.checked_sub(1)?)?;
        Some(tail_chars(text, window).to_string())
    }
}

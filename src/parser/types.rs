//! Event-log line shapes
//!
//! Each line of an event log is one JSON object. Only the fields the engine reads
//! are modelled; everything else is ignored by serde.

use crate::models::Role;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level discriminants that produce entries
pub const ACCEPTED_KINDS: &[&str] = &["user", "assistant", "tool_result"];

/// One decoded event-log line
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLine {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub git_branch: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub message: Option<EventMessage>,
}

/// The nested `message` object
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub content: Option<MessageContent>,
}

/// Message content: either a bare string or an ordered list of typed blocks
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// Closed set of content block variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        #[serde(default)]
        id: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        #[serde(default)]
        tool_use_id: String,
        #[serde(default)]
        content: Value,
        #[serde(default)]
        is_error: bool,
    },
    /// thinking, image and any other block type carry nothing we index
    #[serde(other)]
    Other,
}

impl EventLine {
    /// Whether this line's discriminant produces an entry
    pub fn is_accepted(&self) -> bool {
        self.kind
            .as_deref()
            .is_some_and(|k| ACCEPTED_KINDS.contains(&k))
    }

    /// Role from `message.role`, falling back to the discriminant, then `system`
    pub fn role(&self) -> Role {
        self.message
            .as_ref()
            .and_then(|m| m.role.as_deref())
            .and_then(Role::parse)
            .or_else(|| match self.kind.as_deref() {
                Some("user") => Some(Role::User),
                Some("assistant") => Some(Role::Assistant),
                Some("tool_result") => Some(Role::Tool),
                _ => None,
            })
            .unwrap_or(Role::System)
    }

    /// Content blocks of the message (empty for string content)
    pub fn blocks(&self) -> &[ContentBlock] {
        match self.message.as_ref().and_then(|m| m.content.as_ref()) {
            Some(MessageContent::Blocks(blocks)) => blocks,
            _ => &[],
        }
    }

    /// Model from the top level or the nested message
    pub fn model(&self) -> Option<&str> {
        self.model
            .as_deref()
            .or_else(|| self.message.as_ref().and_then(|m| m.model.as_deref()))
    }
}

//! Stored record types: conversations, entries, artifacts and parse checkpoints.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Speaker of a normalized entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    Tool,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
            Role::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "tool" => Some(Role::Tool),
            "system" => Some(Role::System),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source format tag of a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    EventLog,
    PlainText,
}

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::EventLog => "event_log",
            SourceFormat::PlainText => "plain_text",
        }
    }

    pub fn parse(s: &str) -> Option<SourceFormat> {
        match s {
            "event_log" => Some(SourceFormat::EventLog),
            "plain_text" => Some(SourceFormat::PlainText),
            _ => None,
        }
    }
}

/// Kind of extracted artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    CodeBlock,
    ToolCall,
    ToolResult,
    JsonObject,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::CodeBlock => "code_block",
            ArtifactKind::ToolCall => "tool_call",
            ArtifactKind::ToolResult => "tool_result",
            ArtifactKind::JsonObject => "json_object",
        }
    }

    pub fn parse(s: &str) -> Option<ArtifactKind> {
        match s {
            "code_block" => Some(ArtifactKind::CodeBlock),
            "tool_call" => Some(ArtifactKind::ToolCall),
            "tool_result" => Some(ArtifactKind::ToolResult),
            "json_object" => Some(ArtifactKind::JsonObject),
            _ => None,
        }
    }
}

/// Outcome recorded on an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Error,
    Pending,
    None,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Error => "error",
            Outcome::Pending => "pending",
            Outcome::None => "none",
        }
    }

    pub fn parse(s: &str) -> Option<Outcome> {
        match s {
            "success" => Some(Outcome::Success),
            "error" => Some(Outcome::Error),
            "pending" => Some(Outcome::Pending),
            "none" => Some(Outcome::None),
            _ => None,
        }
    }
}

/// Heuristic category assigned to failed tool results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Permission,
    NotFound,
    Timeout,
    Network,
    Syntax,
    Validation,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Permission => "permission",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Network => "network",
            ErrorCategory::Syntax => "syntax",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<ErrorCategory> {
        match s {
            "permission" => Some(ErrorCategory::Permission),
            "not_found" => Some(ErrorCategory::NotFound),
            "timeout" => Some(ErrorCategory::Timeout),
            "network" => Some(ErrorCategory::Network),
            "syntax" => Some(ErrorCategory::Syntax),
            "validation" => Some(ErrorCategory::Validation),
            "unknown" => Some(ErrorCategory::Unknown),
            _ => None,
        }
    }
}

/// Environment metadata captured when a conversation is first seen
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistant_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
}

/// One logical assistant session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub session_id: String,
    pub source_path: String,
    pub source_format: SourceFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    pub message_count: i64,
    #[serde(flatten)]
    pub environment: Environment,
    pub created_at: String,
}

/// Fields needed to create a conversation
#[derive(Debug, Clone)]
pub struct NewConversation {
    pub session_id: String,
    pub source_path: String,
    pub source_format: SourceFormat,
    pub project: Option<String>,
    pub environment: Environment,
}

/// Derived statistics refreshed after every ingestion batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationStats {
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub duration_ms: Option<i64>,
    pub message_count: i64,
}

/// One normalized message within a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub conversation_id: String,
    pub sequence: i64,
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub content_hash: String,
}

/// Fields needed to append an entry; the store assigns id and sequence
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: Option<String>,
    pub content_hash: String,
}

/// A structured fact extracted from a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: i64,
    pub conversation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<i64>,
    pub kind: ArtifactKind,
    /// Language for code blocks, tool name for tool calls/results
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub content: String,
    pub content_hash: String,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_full: Option<String>,
    pub output_size: i64,
    pub output_truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: String,
}

/// Fields needed to persist an artifact
#[derive(Debug, Clone)]
pub struct NewArtifact {
    pub conversation_id: String,
    pub entry_id: Option<i64>,
    pub kind: ArtifactKind,
    pub label: Option<String>,
    pub content: String,
    pub content_hash: String,
    pub outcome: Outcome,
    pub output_summary: Option<String>,
    pub output_full: Option<String>,
    pub output_size: i64,
    pub output_truncated: bool,
    pub error_category: Option<ErrorCategory>,
    pub context: Option<String>,
    pub metadata: serde_json::Value,
}

/// Per-file progress marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub file_path: String,
    /// Non-empty lines already processed (event logs)
    pub line_count: i64,
    /// Whole-file hash of the last pass (plain text)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    pub last_parsed_at: String,
}

/// Result of an insert guarded by a uniqueness constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i64),
    Duplicate,
}

impl InsertOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }
}

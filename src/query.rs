//! Read-only query surface over stored conversations, entries and artifacts.
//!
//! Nothing here mutates state. Every list operation is offset/limit paginated.

use crate::error::{CoreError, Result};
use crate::models::*;
use crate::store::Store;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const DEFAULT_PAGE_LIMIT: usize = 50;

/// Offset/limit window applied to list results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Default for Page {
    fn default() -> Self {
        Page {
            offset: 0,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl Page {
    pub fn new(offset: usize, limit: usize) -> Self {
        Page { offset, limit }
    }

    /// Every row. The limit still fits a SQLite integer.
    pub fn unbounded() -> Self {
        Page {
            offset: 0,
            limit: i64::MAX as usize,
        }
    }

    /// Apply the window to an already-ordered iterator.
    pub fn apply<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items.into_iter().skip(self.offset).take(self.limit).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConversationFilter {
    pub project: Option<String>,
    pub started_after: Option<DateTime<Utc>>,
    /// Only conversations with at least one artifact whose outcome is error
    pub has_errors: bool,
    pub page: Page,
}

#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub role: Option<Role>,
    pub page: Page,
}

#[derive(Debug, Clone, Default)]
pub struct ArtifactFilter {
    pub kind: Option<ArtifactKind>,
    pub tool_name: Option<String>,
    pub outcome: Option<Outcome>,
    pub page: Page,
}

#[derive(Debug, Clone, Default)]
pub struct ArtifactSearch {
    pub text: String,
    pub project: Option<String>,
    pub kind: Option<ArtifactKind>,
    pub page: Page,
}

/// Aggregate artifact counts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactStats {
    pub total: usize,
    pub by_type: BTreeMap<String, usize>,
    pub errors: usize,
    pub errors_by_category: BTreeMap<String, usize>,
}

impl ArtifactStats {
    /// Fold one artifact into the counts.
    pub fn record(&mut self, kind: ArtifactKind, outcome: Outcome, category: Option<ErrorCategory>) {
        self.total += 1;
        *self.by_type.entry(kind.as_str().to_string()).or_insert(0) += 1;
        if outcome == Outcome::Error {
            self.errors += 1;
            let category = category.unwrap_or(ErrorCategory::Unknown);
            *self
                .errors_by_category
                .entry(category.as_str().to_string())
                .or_insert(0) += 1;
        }
    }
}

/// Substring match used by artifact search, folding ASCII case only.
///
/// Mirrors SQLite `LIKE`, so both backends return the same hits for non-ASCII text.
pub fn matches_text(haystack: &str, needle: &str) -> bool {
    needle.is_empty()
        || haystack
            .to_ascii_lowercase()
            .contains(&needle.to_ascii_lowercase())
}

// ─── Operations ──────────────────────────────────────────────────────────────

pub fn get_conversation<S: Store + ?Sized>(store: &S, id: &str) -> Result<Conversation> {
    store
        .get_conversation(id)?
        .ok_or_else(|| CoreError::ConversationNotFound(id.to_string()))
}

pub fn list_conversations<S: Store + ?Sized>(
    store: &S,
    filter: &ConversationFilter,
) -> Result<Vec<Conversation>> {
    store.list_conversations(filter)
}

pub fn get_conversation_entries<S: Store + ?Sized>(
    store: &S,
    conversation_id: &str,
    filter: &EntryFilter,
) -> Result<Vec<Entry>> {
    get_conversation(store, conversation_id)?;
    store.list_entries(conversation_id, filter)
}

pub fn get_conversation_artifacts<S: Store + ?Sized>(
    store: &S,
    conversation_id: &str,
    filter: &ArtifactFilter,
) -> Result<Vec<Artifact>> {
    get_conversation(store, conversation_id)?;
    store.list_artifacts(conversation_id, filter)
}

pub fn search_artifacts<S: Store + ?Sized>(
    store: &S,
    search: &ArtifactSearch,
) -> Result<Vec<Artifact>> {
    store.search_artifacts(search)
}

pub fn get_artifact_stats<S: Store + ?Sized>(
    store: &S,
    conversation_id: Option<&str>,
) -> Result<ArtifactStats> {
    if let Some(id) = conversation_id {
        get_conversation(store, id)?;
    }
    store.artifact_stats(conversation_id)
}

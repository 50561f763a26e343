//! Ephemeral in-memory storage backend.
//!
//! Mirrors the SQLite schema with plain maps, including the uniqueness rules on
//! `(conversation, content hash)`. All data is lost when the store is dropped.

use crate::error::Result;
use crate::models::*;
use crate::query::{
    matches_text, ArtifactFilter, ArtifactSearch, ArtifactStats, ConversationFilter, EntryFilter,
};
use crate::store::Store;
use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Inner {
    checkpoints: HashMap<String, Checkpoint>,
    conversations: HashMap<String, Conversation>,
    /// Maps session_id → conversation id
    sessions: HashMap<String, String>,
    /// Entries per conversation, in sequence order
    entries: HashMap<String, Vec<Entry>>,
    entry_hashes: HashSet<(String, String)>,
    /// Artifacts in insertion (id) order
    artifacts: Vec<Artifact>,
    artifact_hashes: HashSet<(String, String)>,
    next_entry_id: i64,
    next_artifact_id: i64,
}

/// In-memory volatile store.
///
/// Thread-safe via a single `RwLock`; every write holds the lock for the whole
/// check-then-insert, so uniqueness holds even under concurrent callers.
#[derive(Default)]
pub struct EphemeralStore {
    inner: RwLock<Inner>,
}

impl EphemeralStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn started_key(conv: &Conversation) -> &str {
    conv.started_at.as_deref().unwrap_or(&conv.created_at)
}

impl Store for EphemeralStore {
    fn get_checkpoint(&self, file_path: &str) -> Result<Option<Checkpoint>> {
        Ok(self.read().checkpoints.get(file_path).cloned())
    }

    fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        self.write()
            .checkpoints
            .insert(checkpoint.file_path.clone(), checkpoint.clone());
        Ok(())
    }

    fn get_conversation(&self, id: &str) -> Result<Option<Conversation>> {
        Ok(self.read().conversations.get(id).cloned())
    }

    fn find_conversation_by_session(&self, session_id: &str) -> Result<Option<Conversation>> {
        let inner = self.read();
        Ok(inner
            .sessions
            .get(session_id)
            .and_then(|id| inner.conversations.get(id))
            .cloned())
    }

    fn find_or_create_conversation(&self, new: NewConversation) -> Result<Conversation> {
        let mut inner = self.write();
        if let Some(conv) = inner
            .sessions
            .get(&new.session_id)
            .and_then(|id| inner.conversations.get(id))
        {
            return Ok(conv.clone());
        }

        let conv = Conversation {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: new.session_id.clone(),
            source_path: new.source_path,
            source_format: new.source_format,
            project: new.project,
            started_at: None,
            ended_at: None,
            duration_ms: None,
            message_count: 0,
            environment: new.environment,
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        tracing::info!(
            "Ephemeral: created conversation {} for session {}",
            conv.id,
            conv.session_id
        );

        inner.sessions.insert(new.session_id, conv.id.clone());
        inner.conversations.insert(conv.id.clone(), conv.clone());
        Ok(conv)
    }

    fn set_project_if_missing(&self, conversation_id: &str, project: &str) -> Result<()> {
        if let Some(conv) = self.write().conversations.get_mut(conversation_id) {
            if conv.project.is_none() {
                conv.project = Some(project.to_string());
            }
        }
        Ok(())
    }

    fn update_conversation_stats(
        &self,
        conversation_id: &str,
        stats: &ConversationStats,
    ) -> Result<()> {
        if let Some(conv) = self.write().conversations.get_mut(conversation_id) {
            conv.started_at = stats.started_at.clone();
            conv.ended_at = stats.ended_at.clone();
            conv.duration_ms = stats.duration_ms;
            conv.message_count = stats.message_count;
        }
        Ok(())
    }

    fn entry_exists(&self, conversation_id: &str, content_hash: &str) -> Result<bool> {
        Ok(self
            .read()
            .entry_hashes
            .contains(&(conversation_id.to_string(), content_hash.to_string())))
    }

    fn insert_entry(&self, entry: &NewEntry) -> Result<InsertOutcome> {
        let mut inner = self.write();
        let key = (entry.conversation_id.clone(), entry.content_hash.clone());
        if !inner.entry_hashes.insert(key) {
            return Ok(InsertOutcome::Duplicate);
        }

        inner.next_entry_id += 1;
        let id = inner.next_entry_id;
        let list = inner.entries.entry(entry.conversation_id.clone()).or_default();
        let sequence = list.last().map(|e| e.sequence + 1).unwrap_or(0);
        list.push(Entry {
            id,
            conversation_id: entry.conversation_id.clone(),
            sequence,
            role: entry.role,
            content: entry.content.clone(),
            timestamp: entry.timestamp.clone(),
            content_hash: entry.content_hash.clone(),
        });
        Ok(InsertOutcome::Inserted(id))
    }

    fn entry_timestamps(&self, conversation_id: &str) -> Result<Vec<Option<String>>> {
        Ok(self
            .read()
            .entries
            .get(conversation_id)
            .map(|list| list.iter().map(|e| e.timestamp.clone()).collect())
            .unwrap_or_default())
    }

    fn artifact_exists(&self, conversation_id: &str, content_hash: &str) -> Result<bool> {
        Ok(self
            .read()
            .artifact_hashes
            .contains(&(conversation_id.to_string(), content_hash.to_string())))
    }

    fn insert_artifact(&self, artifact: &NewArtifact) -> Result<InsertOutcome> {
        let mut inner = self.write();
        let key = (artifact.conversation_id.clone(), artifact.content_hash.clone());
        if !inner.artifact_hashes.insert(key) {
            return Ok(InsertOutcome::Duplicate);
        }

        inner.next_artifact_id += 1;
        let id = inner.next_artifact_id;
        inner.artifacts.push(Artifact {
            id,
            conversation_id: artifact.conversation_id.clone(),
            entry_id: artifact.entry_id,
            kind: artifact.kind,
            label: artifact.label.clone(),
            content: artifact.content.clone(),
            content_hash: artifact.content_hash.clone(),
            outcome: artifact.outcome,
            output_summary: artifact.output_summary.clone(),
            output_full: artifact.output_full.clone(),
            output_size: artifact.output_size,
            output_truncated: artifact.output_truncated,
            error_category: artifact.error_category,
            context: artifact.context.clone(),
            metadata: artifact.metadata.clone(),
            created_at: chrono::Utc::now().to_rfc3339(),
        });
        Ok(InsertOutcome::Inserted(id))
    }

    fn list_conversations(&self, filter: &ConversationFilter) -> Result<Vec<Conversation>> {
        let inner = self.read();
        let since = filter.started_after.map(|t| t.to_rfc3339());

        let mut matching: Vec<&Conversation> = inner
            .conversations
            .values()
            .filter(|c| {
                filter
                    .project
                    .as_ref()
                    .map_or(true, |p| c.project.as_ref() == Some(p))
            })
            .filter(|c| match (&since, &c.started_at) {
                (Some(since), Some(started)) => started.as_str() >= since.as_str(),
                (Some(_), None) => false,
                (None, _) => true,
            })
            .filter(|c| {
                !filter.has_errors
                    || inner
                        .artifacts
                        .iter()
                        .any(|a| a.conversation_id == c.id && a.outcome == Outcome::Error)
            })
            .collect();

        matching.sort_by(|a, b| started_key(b).cmp(started_key(a)));
        Ok(filter.page.apply(matching.into_iter().cloned()))
    }

    fn list_entries(&self, conversation_id: &str, filter: &EntryFilter) -> Result<Vec<Entry>> {
        let inner = self.read();
        let Some(list) = inner.entries.get(conversation_id) else {
            return Ok(Vec::new());
        };
        Ok(filter.page.apply(
            list.iter()
                .filter(|e| filter.role.map_or(true, |r| e.role == r))
                .cloned(),
        ))
    }

    fn list_artifacts(
        &self,
        conversation_id: &str,
        filter: &ArtifactFilter,
    ) -> Result<Vec<Artifact>> {
        let inner = self.read();
        Ok(filter.page.apply(
            inner
                .artifacts
                .iter()
                .filter(|a| a.conversation_id == conversation_id)
                .filter(|a| filter.kind.map_or(true, |k| a.kind == k))
                .filter(|a| {
                    filter.tool_name.as_ref().map_or(true, |tool| {
                        matches!(a.kind, ArtifactKind::ToolCall | ArtifactKind::ToolResult)
                            && a.label.as_ref() == Some(tool)
                    })
                })
                .filter(|a| filter.outcome.map_or(true, |o| a.outcome == o))
                .cloned(),
        ))
    }

    fn search_artifacts(&self, search: &ArtifactSearch) -> Result<Vec<Artifact>> {
        let inner = self.read();
        Ok(search.page.apply(
            inner
                .artifacts
                .iter()
                .rev()
                .filter(|a| {
                    matches_text(&a.content, &search.text)
                        || a.output_summary
                            .as_deref()
                            .is_some_and(|s| matches_text(s, &search.text))
                })
                .filter(|a| search.kind.map_or(true, |k| a.kind == k))
                .filter(|a| {
                    search.project.as_ref().map_or(true, |p| {
                        inner
                            .conversations
                            .get(&a.conversation_id)
                            .is_some_and(|c| c.project.as_ref() == Some(p))
                    })
                })
                .cloned(),
        ))
    }

    fn artifact_stats(&self, conversation_id: Option<&str>) -> Result<ArtifactStats> {
        let inner = self.read();
        let mut stats = ArtifactStats::default();
        for artifact in inner
            .artifacts
            .iter()
            .filter(|a| conversation_id.map_or(true, |id| a.conversation_id == id))
        {
            stats.record(artifact.kind, artifact.outcome, artifact.error_category);
        }
        Ok(stats)
    }
}

//! Storage port used by the parser, the extractor and the query surface.
//!
//! Two backends implement it:
//! - [`crate::db::Database`]: SQLite, enforces uniqueness with table constraints
//! - [`crate::ephemeral::EphemeralStore`]: in-memory maps with the same semantics
//!
//! Inserts guarded by a uniqueness key return [`InsertOutcome::Duplicate`] instead of
//! failing, so callers can treat a racing duplicate as an expected skip.

use crate::error::Result;
use crate::models::*;
use crate::query::{ArtifactFilter, ArtifactSearch, ArtifactStats, ConversationFilter, EntryFilter};

pub trait Store: Send + Sync {
    // ─── Checkpoints ────────────────────────────────────────────────────────

    fn get_checkpoint(&self, file_path: &str) -> Result<Option<Checkpoint>>;

    /// Insert or replace the checkpoint for `checkpoint.file_path`.
    fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()>;

    // ─── Conversations ──────────────────────────────────────────────────────

    fn get_conversation(&self, id: &str) -> Result<Option<Conversation>>;

    fn find_conversation_by_session(&self, session_id: &str) -> Result<Option<Conversation>>;

    /// Find the conversation for `new.session_id`, creating it if absent.
    /// Environment metadata is only written on creation.
    fn find_or_create_conversation(&self, new: NewConversation) -> Result<Conversation>;

    /// Attach a project unless the conversation already has one.
    fn set_project_if_missing(&self, conversation_id: &str, project: &str) -> Result<()>;

    fn update_conversation_stats(&self, conversation_id: &str, stats: &ConversationStats)
        -> Result<()>;

    // ─── Entries ────────────────────────────────────────────────────────────

    fn entry_exists(&self, conversation_id: &str, content_hash: &str) -> Result<bool>;

    /// Append an entry at the next sequence index of its conversation.
    fn insert_entry(&self, entry: &NewEntry) -> Result<InsertOutcome>;

    /// Timestamps of every stored entry of a conversation, in sequence order.
    fn entry_timestamps(&self, conversation_id: &str) -> Result<Vec<Option<String>>>;

    // ─── Artifacts ──────────────────────────────────────────────────────────

    fn artifact_exists(&self, conversation_id: &str, content_hash: &str) -> Result<bool>;

    fn insert_artifact(&self, artifact: &NewArtifact) -> Result<InsertOutcome>;

    // ─── Reads ──────────────────────────────────────────────────────────────

    fn list_conversations(&self, filter: &ConversationFilter) -> Result<Vec<Conversation>>;

    fn list_entries(&self, conversation_id: &str, filter: &EntryFilter) -> Result<Vec<Entry>>;

    fn list_artifacts(&self, conversation_id: &str, filter: &ArtifactFilter)
        -> Result<Vec<Artifact>>;

    fn search_artifacts(&self, search: &ArtifactSearch) -> Result<Vec<Artifact>>;

    /// Artifact counts for one conversation, or across all when `None`.
    fn artifact_stats(&self, conversation_id: Option<&str>) -> Result<ArtifactStats>;
}

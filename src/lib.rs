//! Yotrace - incremental transcript parsing and artifact extraction for AI coding sessions
//!
//! This crate provides:
//! - Checkpointed parsing of event-log (JSONL) and plain-text transcripts
//! - Content-hash deduplication of conversation entries
//! - Artifact extraction: tool calls and results, code blocks, embedded JSON
//! - Size-tiered output retention and error classification
//! - A read-only query surface over SQLite or in-memory storage
//!
//! # Usage
//!
//! ```ignore
//! use yotrace::{Config, Core};
//!
//! let core = Core::new(Config::default())?;
//! let parsed = core.parse_file("session.jsonl".as_ref(), Some("webapp"))?;
//! if let Some(id) = parsed.conversation_id {
//!     core.extract_artifacts(&id)?;
//! }
//! ```

pub mod config;
pub mod db;
pub mod ephemeral;
pub mod error;
pub mod extract;
pub mod models;
pub mod parser;
pub mod query;
pub mod store;

// Re-export main types for convenience
pub use config::{Config, ExtractionConfig};
pub use db::Database;
pub use ephemeral::EphemeralStore;
pub use error::{CoreError, Result};
pub use extract::ExtractionOutcome;
pub use parser::ParseOutcome;
pub use query::{ArtifactFilter, ArtifactSearch, ArtifactStats, ConversationFilter, EntryFilter, Page};
pub use store::Store;

use models::{Artifact, Conversation, Entry};
use std::path::Path;
use std::sync::Arc;

/// Entry point bundling configuration with a storage backend
pub struct Core {
    pub config: Config,
    store: Arc<dyn Store>,
}

impl Core {
    /// Open (or create) the SQLite database under the configured data directory
    pub fn new(config: Config) -> Result<Self> {
        let db_path = config.db_path();
        let db = Database::new(db_path)?;
        Ok(Core {
            config,
            store: Arc::new(db),
        })
    }

    /// Use an existing storage backend
    pub fn with_store(config: Config, store: Arc<dyn Store>) -> Self {
        Core { config, store }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Parse new content of a transcript file
    pub fn parse_file(&self, path: &Path, project_hint: Option<&str>) -> Result<ParseOutcome> {
        parser::parse_file(self.store.as_ref(), path, project_hint)
    }

    /// Extract artifacts for a parsed conversation
    pub fn extract_artifacts(&self, conversation_id: &str) -> Result<ExtractionOutcome> {
        extract::extract_artifacts(self.store.as_ref(), conversation_id, &self.config.extraction)
    }

    pub fn get_conversation(&self, id: &str) -> Result<Conversation> {
        query::get_conversation(self.store.as_ref(), id)
    }

    pub fn list_conversations(&self, filter: &ConversationFilter) -> Result<Vec<Conversation>> {
        query::list_conversations(self.store.as_ref(), filter)
    }

    pub fn get_conversation_entries(&self, id: &str, filter: &EntryFilter) -> Result<Vec<Entry>> {
        query::get_conversation_entries(self.store.as_ref(), id, filter)
    }

    pub fn get_conversation_artifacts(
        &self,
        id: &str,
        filter: &ArtifactFilter,
    ) -> Result<Vec<Artifact>> {
        query::get_conversation_artifacts(self.store.as_ref(), id, filter)
    }

    pub fn search_artifacts(&self, search: &ArtifactSearch) -> Result<Vec<Artifact>> {
        query::search_artifacts(self.store.as_ref(), search)
    }

    /// Artifact counts for one conversation, or across all of them
    pub fn get_artifact_stats(&self, conversation_id: Option<&str>) -> Result<ArtifactStats> {
        query::get_artifact_stats(self.store.as_ref(), conversation_id)
    }
}

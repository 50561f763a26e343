//! Incremental transcript parser
//!
//! Dispatches a source file to a format strategy by extension:
//! - event logs (`.jsonl`, `.ndjson`) are parsed line by line from a stored line-count checkpoint
//! - plain-text transcripts (`.txt`, `.md`, `.log`) are re-split on role markers whenever
//!   their whole-file hash changes

pub mod common;
pub mod event_log;
pub mod plain_text;
pub mod types;

pub use types::*;

use crate::error::{CoreError, Result};
use crate::models::SourceFormat;
use crate::store::Store;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Result of parsing one source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseOutcome {
    pub success: bool,
    /// Owning conversation; `None` only for an unchanged plain-text file never seen before
    pub conversation_id: Option<String>,
    pub new_entries: usize,
    /// Lines or segments whose content hash was already stored
    pub skipped: usize,
}

/// Map a file extension to a source format.
pub fn detect_format(path: &Path) -> Option<SourceFormat> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jsonl" | "ndjson" => Some(SourceFormat::EventLog),
        "txt" | "md" | "log" => Some(SourceFormat::PlainText),
        _ => None,
    }
}

/// File stem used when a source carries no session identifier.
pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Parse new content of `path` into entries of its conversation.
///
/// Fails with `FileNotFound` or `UnknownFormat` before touching the store.
pub fn parse_file<S: Store + ?Sized>(
    store: &S,
    path: &Path,
    project_hint: Option<&str>,
) -> Result<ParseOutcome> {
    if !path.is_file() {
        return Err(CoreError::FileNotFound(path.to_path_buf()));
    }
    let format = detect_format(path).ok_or_else(|| CoreError::UnknownFormat(path.to_path_buf()))?;

    let outcome = match format {
        SourceFormat::EventLog => event_log::parse(store, path, project_hint)?,
        SourceFormat::PlainText => plain_text::parse(store, path, project_hint)?,
    };

    tracing::info!(
        "Parsed {} ({}): {} new entries, {} skipped",
        path.display(),
        format.as_str(),
        outcome.new_entries,
        outcome.skipped
    );

    Ok(outcome)
}

/// Recompute start/end/duration/message count from stored entries.
pub(crate) fn refresh_conversation_stats<S: Store + ?Sized>(
    store: &S,
    conversation_id: &str,
) -> Result<()> {
    let timestamps = store.entry_timestamps(conversation_id)?;
    let stats = common::calculate_stats(&timestamps);
    store.update_conversation_stats(conversation_id, &stats)
}

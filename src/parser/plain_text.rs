//! Plain-text transcript strategy
//!
//! Plain text carries no line-stable structure, so the whole file is the unit of change:
//! an unchanged whole-file hash is a no-op, any other edit re-evaluates every segment and
//! lets per-segment hashes filter out what is already stored.

use super::common::content_hash;
use super::{file_stem, refresh_conversation_stats, ParseOutcome};
use crate::error::Result;
use crate::models::*;
use crate::store::Store;
use regex::Regex;
use std::borrow::Cow;
use std::path::Path;
use std::sync::OnceLock;

/// Line-start speaker markers: `Human:` / `User:` / `Assistant:` / `AI:` or a `>` quote
fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^[ \t]*(?:(human|user|assistant|ai)[ \t]*:|(>))[ \t]?")
            .expect("role marker regex is valid")
    })
}

fn marker_role(caps: &regex::Captures<'_>) -> Role {
    if caps.get(2).is_some() {
        return Role::User;
    }
    match caps
        .get(1)
        .map(|m| m.as_str().to_ascii_lowercase())
        .as_deref()
    {
        Some("assistant") | Some("ai") => Role::Assistant,
        _ => Role::User,
    }
}

/// Split a transcript into `(role, text)` segments in document order.
///
/// Text before the first marker is attributed to the user. Empty segments are dropped.
pub fn split_segments(text: &str) -> Vec<(Role, String)> {
    let mut segments = Vec::new();
    let mut role = Role::User;
    let mut last_end = 0;

    let mut push = |role: Role, segment: &str| {
        let trimmed = segment.trim();
        if !trimmed.is_empty() {
            segments.push((role, trimmed.to_string()));
        }
    };

    for caps in marker_regex().captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        push(role, &text[last_end..whole.start()]);
        role = marker_role(&caps);
        last_end = whole.end();
    }
    push(role, &text[last_end..]);

    segments
}

/// Session identifier for a plain-text source, kept apart from event-log identifiers.
pub fn session_id_for(path: &Path) -> String {
    format!("text-{}", file_stem(path))
}

pub(super) fn parse<S: Store + ?Sized>(
    store: &S,
    path: &Path,
    project_hint: Option<&str>,
) -> Result<ParseOutcome> {
    let file_path = path.to_string_lossy().to_string();
    let bytes = std::fs::read(path)?;
    let file_hash = content_hash(&bytes);
    let raw = String::from_utf8_lossy(&bytes);
    if matches!(raw, Cow::Owned(_)) {
        tracing::warn!("{} is not valid UTF-8, undecodable bytes replaced", file_path);
    }
    let session_id = session_id_for(path);

    let checkpoint = store.get_checkpoint(&file_path)?;
    if checkpoint.as_ref().and_then(|c| c.content_hash.as_deref()) == Some(file_hash.as_str()) {
        tracing::debug!("{} unchanged since last parse", file_path);
        return Ok(ParseOutcome {
            success: true,
            conversation_id: store.find_conversation_by_session(&session_id)?.map(|c| c.id),
            new_entries: 0,
            skipped: 0,
        });
    }

    let conversation = store.find_or_create_conversation(NewConversation {
        session_id,
        source_path: file_path.clone(),
        source_format: SourceFormat::PlainText,
        project: project_hint.map(str::to_string),
        environment: Environment::default(),
    })?;
    if let Some(project) = project_hint {
        store.set_project_if_missing(&conversation.id, project)?;
    }

    let mut new_entries = 0;
    let mut skipped = 0;

    for (role, segment) in split_segments(&raw) {
        let hash = content_hash(&segment);
        if store.entry_exists(&conversation.id, &hash)? {
            skipped += 1;
            continue;
        }
        let outcome = store.insert_entry(&NewEntry {
            conversation_id: conversation.id.clone(),
            role,
            content: segment,
            timestamp: None,
            content_hash: hash,
        })?;
        if outcome.is_inserted() {
            new_entries += 1;
        } else {
            skipped += 1;
        }
    }

    store.save_checkpoint(&Checkpoint {
        file_path,
        line_count: 0,
        content_hash: Some(file_hash),
        last_parsed_at: chrono::Utc::now().to_rfc3339(),
    })?;
    refresh_conversation_stats(store, &conversation.id)?;

    Ok(ParseOutcome {
        success: true,
        conversation_id: Some(conversation.id),
        new_entries,
        skipped,
    })
}

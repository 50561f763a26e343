//! Event-log (JSONL) strategy
//!
//! Lines before the stored checkpoint are skipped without re-validation. Each accepted
//! new line is hashed in full and stored once per conversation.

use super::common::{content_hash, line_text};
use super::types::EventLine;
use super::{file_stem, refresh_conversation_stats, ParseOutcome};
use crate::error::Result;
use crate::models::*;
use crate::store::Store;
use std::path::Path;
use std::str::Utf8Error;

/// Session identifier and environment metadata gathered from the whole file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionIdentity {
    pub session_id: Option<String>,
    pub environment: Environment,
}

impl SessionIdentity {
    fn is_complete(&self) -> bool {
        self.session_id.is_some()
            && self.environment.assistant_version.is_some()
            && self.environment.model.is_some()
            && self.environment.git_branch.is_some()
            && self.environment.cwd.is_some()
    }

    /// Fill each field from the first decodable line that carries it.
    pub fn scan(lines: &[&str]) -> Self {
        let mut identity = SessionIdentity::default();
        for line in lines {
            let Ok(event) = serde_json::from_str::<EventLine>(line) else {
                continue;
            };
            let non_empty = |v: Option<&str>| v.filter(|s| !s.is_empty()).map(str::to_string);

            if identity.session_id.is_none() {
                identity.session_id = non_empty(event.session_id.as_deref());
            }
            let env = &mut identity.environment;
            if env.assistant_version.is_none() {
                env.assistant_version = non_empty(event.version.as_deref());
            }
            if env.model.is_none() {
                env.model = non_empty(event.model());
            }
            if env.git_branch.is_none() {
                env.git_branch = non_empty(event.git_branch.as_deref());
            }
            if env.cwd.is_none() {
                env.cwd = non_empty(event.cwd.as_deref());
            }
            if identity.is_complete() {
                break;
            }
        }
        identity
    }
}

/// One non-empty source line; `Err` when its bytes are not valid UTF-8
pub type RawLine<'a> = std::result::Result<&'a str, Utf8Error>;

/// Split raw file bytes into trimmed, non-empty lines.
///
/// Lines are decoded one at a time so a bad byte costs only its own line. Undecodable
/// lines keep their position and count towards the checkpoint.
pub fn split_lines(raw: &[u8]) -> Vec<RawLine<'_>> {
    raw.split(|&b| b == b'\n')
        .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
        .map(|line| std::str::from_utf8(line).map(str::trim))
        .filter(|line| !matches!(line, Ok(text) if text.is_empty()))
        .collect()
}

pub(super) fn parse<S: Store + ?Sized>(
    store: &S,
    path: &Path,
    project_hint: Option<&str>,
) -> Result<ParseOutcome> {
    let file_path = path.to_string_lossy().to_string();
    let raw = std::fs::read(path)?;
    let lines = split_lines(&raw);

    let mut start = store
        .get_checkpoint(&file_path)?
        .map(|c| c.line_count.max(0) as usize)
        .unwrap_or(0);
    if start > lines.len() {
        // File shrank (truncated or rotated): reprocess from the top, hashes keep stored lines unique
        tracing::warn!(
            "{} has {} lines but checkpoint is at {}, resetting",
            file_path,
            lines.len(),
            start
        );
        start = 0;
    }

    let decoded: Vec<&str> = lines.iter().filter_map(|l| l.as_ref().ok().copied()).collect();
    let identity = SessionIdentity::scan(&decoded);
    let session_id = identity
        .session_id
        .unwrap_or_else(|| file_stem(path));

    let conversation = store.find_or_create_conversation(NewConversation {
        session_id,
        source_path: file_path.clone(),
        source_format: SourceFormat::EventLog,
        project: project_hint.map(str::to_string),
        environment: identity.environment,
    })?;
    if let Some(project) = project_hint {
        store.set_project_if_missing(&conversation.id, project)?;
    }

    let mut new_entries = 0;
    let mut skipped = 0;

    for (index, line) in lines.iter().enumerate().skip(start) {
        let line = match line {
            Ok(line) => *line,
            Err(e) => {
                tracing::warn!("Skipping undecodable line {} of {}: {}", index + 1, file_path, e);
                continue;
            }
        };
        let event: EventLine = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Skipping malformed line {} of {}: {}", index + 1, file_path, e);
                continue;
            }
        };
        if !event.is_accepted() {
            continue;
        }

        let content = line_text(&event);
        if content.trim().is_empty() {
            continue;
        }

        let hash = content_hash(line);
        if store.entry_exists(&conversation.id, &hash)? {
            skipped += 1;
            continue;
        }

        let outcome = store.insert_entry(&NewEntry {
            conversation_id: conversation.id.clone(),
            role: event.role(),
            content,
            timestamp: event.timestamp.clone(),
            content_hash: hash,
        })?;
        match outcome {
            InsertOutcome::Inserted(_) => new_entries += 1,
            InsertOutcome::Duplicate => {
                tracing::debug!("Line {} of {} stored concurrently", index + 1, file_path);
                skipped += 1;
            }
        }
    }

    store.save_checkpoint(&Checkpoint {
        file_path,
        line_count: lines.len() as i64,
        content_hash: None,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::ephemeral::EphemeralStore;
    use crate::parser::parse_file;
    use crate::query::EntryFilter;
    use crate::store::testing::UncheckedStore;
    use std::io::Write;

    const USER_LINE: &str = r#"{"type":"user","sessionId":"sess-1","timestamp":"2024-01-01T00:00:00Z","version":"1.0.3","gitBranch":"main","cwd":"/repo","message":{"role":"user","content":"Fix the login bug"}}"#;
    const ASSISTANT_LINE: &str = r#"{"type":"assistant","sessionId":"sess-1","timestamp":"2024-01-01T00:01:00Z","message":{"role":"assistant","model":"claude-sonnet-4","content":[{"type":"text","text":"Looking"},{"type":"tool_use","id":"t1","name":"Read","input":{"file_path":"/repo/login.rs"}}]}}"#;
    const RESULT_LINE: &str = r#"{"type":"user","sessionId":"sess-1","timestamp":"2024-01-01T00:02:00Z","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"t1","content":"fn login() {}"}]}}"#;

    fn write_lines(path: &Path, lines: &[&str]) {
        let mut file = std::fs::File::create(path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
    }

    #[test]
    fn test_parse_creates_conversation_with_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        write_lines(&path, &[USER_LINE, ASSISTANT_LINE, RESULT_LINE]);

        let store = EphemeralStore::new();
        let outcome = parse_file(&store, &path, Some("webapp")).unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.new_entries, 3);
        assert_eq!(outcome.skipped, 0);

        let conv = store
            .get_conversation(outcome.conversation_id.as_deref().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(conv.session_id, "sess-1");
        assert_eq!(conv.project.as_deref(), Some("webapp"));
        assert_eq!(conv.environment.model.as_deref(), Some("claude-sonnet-4"));
        assert_eq!(conv.environment.git_branch.as_deref(), Some("main"));
        assert_eq!(conv.environment.assistant_version.as_deref(), Some("1.0.3"));
        assert_eq!(conv.message_count, 3);
        assert_eq!(conv.duration_ms, Some(120_000));

        let entries = store.list_entries(&conv.id, &EntryFilter::default()).unwrap();
        assert_eq!(entries[0].role, Role::User);
        assert_eq!(entries[1].role, Role::Assistant);
        assert!(entries[1].content.contains("[Tool: Read]"));
        assert!(entries[2].content.starts_with("[Tool Result: t1]\nfn login() {}"));
    }

    #[test]
    fn test_reparse_unchanged_file_yields_nothing_new() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        write_lines(&path, &[USER_LINE, ASSISTANT_LINE]);

        let store = Database::in_memory().unwrap();
        assert_eq!(parse_file(&store, &path, None).unwrap().new_entries, 2);

        let again = parse_file(&store, &path, None).unwrap();
        assert_eq!(again.new_entries, 0);
        assert_eq!(again.skipped, 0);
    }

    #[test]
    fn test_appended_lines_are_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        write_lines(&path, &[USER_LINE]);

        let store = EphemeralStore::new();
        parse_file(&store, &path, None).unwrap();

        write_lines(&path, &[USER_LINE, ASSISTANT_LINE, RESULT_LINE]);
        let outcome = parse_file(&store, &path, None).unwrap();
        assert_eq!(outcome.new_entries, 2);

        let checkpoint = store.get_checkpoint(&path.to_string_lossy()).unwrap().unwrap();
        assert_eq!(checkpoint.line_count, 3);
    }

    #[test]
    fn test_malformed_line_is_skipped_and_checkpoint_advances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        write_lines(&path, &[USER_LINE, "{not json", ASSISTANT_LINE]);

        let store = EphemeralStore::new();
        let outcome = parse_file(&store, &path, None).unwrap();
        assert_eq!(outcome.new_entries, 2);

        let checkpoint = store.get_checkpoint(&path.to_string_lossy()).unwrap().unwrap();
        assert_eq!(checkpoint.line_count, 3);
    }

    #[test]
    fn test_invalid_utf8_line_is_skipped_and_checkpoint_advances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(USER_LINE.as_bytes());
        bytes.extend_from_slice(b"\n\xff\xfe garbage\n");
        bytes.extend_from_slice(ASSISTANT_LINE.as_bytes());
        bytes.push(b'\n');
        std::fs::write(&path, bytes).unwrap();

        let store = EphemeralStore::new();
        let outcome = parse_file(&store, &path, None).unwrap();
        assert_eq!(outcome.new_entries, 2);

        let checkpoint = store.get_checkpoint(&path.to_string_lossy()).unwrap().unwrap();
        assert_eq!(checkpoint.line_count, 3);

        let again = parse_file(&store, &path, None).unwrap();
        assert_eq!(again.new_entries, 0);
    }

    #[test]
    fn test_split_lines_keeps_undecodable_positions() {
        let lines = split_lines(b"a\r\n\n  \n\xff\nb");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], Ok("a"));
        assert!(lines[1].is_err());
        assert_eq!(lines[2], Ok("b"));
    }

    #[test]
    fn test_ignored_kinds_and_empty_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc-123.jsonl");
        write_lines(
            &path,
            &[
                r#"{"type":"summary","summary":"Login fix"}"#,
                r#"{"type":"assistant","message":{"role":"assistant","content":[{"type":"thinking","thinking":"..."}]}}"#,
                r#"{"type":"user","message":{"role":"user","content":"hello"}}"#,
            ],
        );

        let store = EphemeralStore::new();
        let outcome = parse_file(&store, &path, None).unwrap();
        assert_eq!(outcome.new_entries, 1);
        assert_eq!(outcome.skipped, 0);

        // No sessionId anywhere: identifier comes from the file name
        let conv = store.find_conversation_by_session("abc-123").unwrap();
        assert!(conv.is_some());
    }

    #[test]
    fn test_repeated_line_counts_as_skip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        write_lines(&path, &[USER_LINE, USER_LINE]);

        let store = EphemeralStore::new();
        let outcome = parse_file(&store, &path, None).unwrap();
        assert_eq!(outcome.new_entries, 1);
        assert_eq!(outcome.skipped, 1);
    }

    #[test]
    fn test_duplicate_at_insert_counts_as_skip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        write_lines(&path, &[USER_LINE, ASSISTANT_LINE, USER_LINE]);

        let store = UncheckedStore(Database::in_memory().unwrap());
        let outcome = parse_file(&store, &path, None).unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.new_entries, 2);
        assert_eq!(outcome.skipped, 1);

        let conv = store.find_conversation_by_session("sess-1").unwrap().unwrap();
        assert_eq!(conv.message_count, 2);
    }

    #[test]
    fn test_truncated_file_resets_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        write_lines(&path, &[USER_LINE, ASSISTANT_LINE, RESULT_LINE]);

        let store = EphemeralStore::new();
        parse_file(&store, &path, None).unwrap();

        let rewritten = r#"{"type":"user","sessionId":"sess-1","message":{"role":"user","content":"new start"}}"#;
        write_lines(&path, &[rewritten]);
        let outcome = parse_file(&store, &path, None).unwrap();
        assert_eq!(outcome.new_entries, 1);

        let checkpoint = store.get_checkpoint(&path.to_string_lossy()).unwrap().unwrap();
        assert_eq!(checkpoint.line_count, 1);
    }

    #[test]
    fn test_session_identity_first_wins() {
        let identity = SessionIdentity::scan(&[
            "garbage",
            r#"{"type":"user","cwd":"/one"}"#,
            r#"{"type":"user","sessionId":"first","cwd":"/two"}"#,
            r#"{"type":"user","sessionId":"second"}"#,
        ]);
        assert_eq!(identity.session_id.as_deref(), Some("first"));
        assert_eq!(identity.environment.cwd.as_deref(), Some("/one"));
    }
}

//! Artifact extraction
//!
//! Turns a parsed conversation into typed artifacts:
//! - `tool_call` / `tool_result`: correlated tool exchanges with tiered output and
//!   classified errors (event-log sources only)
//! - `code_block`: fenced code in assistant text
//! - `json_object`: JSON objects embedded in assistant text
//!
//! Every artifact is keyed by a content hash unique per conversation, so extraction
//! can be re-run at any time without creating duplicates.

pub mod classify;
pub mod correlate;
pub mod scan;
pub mod tiering;

pub use classify::classify_error;
pub use correlate::{correlate, ContextIndex, ToolExchange};
pub use tiering::{tier_output, TieredOutput};

use crate::config::ExtractionConfig;
use crate::error::{CoreError, Result};
use crate::models::*;
use crate::parser::common::{
    composite_hash, content_hash, generate_tool_summary, prose_text, stringify_value, tail_chars,
};
use crate::parser::event_log::split_lines;
use crate::parser::EventLine;
use crate::query::{EntryFilter, Page};
use crate::store::Store;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;

/// Counts of newly stored artifacts per kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    pub success: bool,
    pub tool_calls: usize,
    pub tool_results: usize,
    pub code_blocks: usize,
    pub json_objects: usize,
    /// Artifacts whose hash was already stored for the conversation
    pub skipped: usize,
}

/// Persists artifacts for one conversation and keeps the counts
struct ArtifactWriter<'a, S: Store + ?Sized> {
    store: &'a S,
    conversation_id: &'a str,
    outcome: ExtractionOutcome,
}

impl<'a, S: Store + ?Sized> ArtifactWriter<'a, S> {
    fn new(store: &'a S, conversation_id: &'a str) -> Self {
        ArtifactWriter {
            store,
            conversation_id,
            outcome: ExtractionOutcome::default(),
        }
    }

    /// True (and counted as skipped) when the hash is already stored.
    fn seen(&mut self, hash: &str) -> Result<bool> {
        if self.store.artifact_exists(self.conversation_id, hash)? {
            self.outcome.skipped += 1;
            return Ok(true);
        }
        Ok(false)
    }

    fn insert(&mut self, artifact: NewArtifact) -> Result<()> {
        match self.store.insert_artifact(&artifact)? {
            InsertOutcome::Inserted(_) => {
                let counter = match artifact.kind {
                    ArtifactKind::ToolCall => &mut self.outcome.tool_calls,
                    ArtifactKind::ToolResult => &mut self.outcome.tool_results,
                    ArtifactKind::CodeBlock => &mut self.outcome.code_blocks,
                    ArtifactKind::JsonObject => &mut self.outcome.json_objects,
                };
                *counter += 1;
            }
            InsertOutcome::Duplicate => self.outcome.skipped += 1,
        }
        Ok(())
    }

    fn artifact(&self, kind: ArtifactKind, content: String, content_hash: String) -> NewArtifact {
        NewArtifact {
            conversation_id: self.conversation_id.to_string(),
            entry_id: None,
            kind,
            label: None,
            content,
            content_hash,
            outcome: Outcome::None,
            output_summary: None,
            output_full: None,
            output_size: 0,
            output_truncated: false,
            error_category: None,
            context: None,
            metadata: json!({}),
        }
    }

    fn finish(mut self) -> ExtractionOutcome {
        self.outcome.success = true;
        self.outcome
    }
}

/// Extract artifacts for a stored conversation.
///
/// Re-reads the source file when it is an event log still on disk; otherwise scans
/// the stored entries, where tool exchanges are no longer recoverable.
pub fn extract_artifacts<S: Store + ?Sized>(
    store: &S,
    conversation_id: &str,
    config: &ExtractionConfig,
) -> Result<ExtractionOutcome> {
    let conversation = store
        .get_conversation(conversation_id)?
        .ok_or_else(|| CoreError::ConversationNotFound(conversation_id.to_string()))?;

    let source = Path::new(&conversation.source_path);
    let mut writer = ArtifactWriter::new(store, &conversation.id);

    if conversation.source_format == SourceFormat::EventLog && source.is_file() {
        tracing::debug!("Extracting from source file {}", source.display());
        extract_from_file(&mut writer, source, config)?;
    } else {
        tracing::debug!("Extracting from stored entries of {}", conversation.id);
        extract_from_entries(&mut writer, config)?;
    }

    let outcome = writer.finish();
    tracing::info!(
        "Extracted artifacts for {}: {} tool calls, {} tool results, {} code blocks, {} json objects, {} skipped",
        conversation.id,
        outcome.tool_calls,
        outcome.tool_results,
        outcome.code_blocks,
        outcome.json_objects,
        outcome.skipped
    );

    Ok(outcome)
}

fn extract_from_file<S: Store + ?Sized>(
    writer: &mut ArtifactWriter<'_, S>,
    source: &Path,
    config: &ExtractionConfig,
) -> Result<()> {
    let raw = std::fs::read(source)?;
    // Indices match the parser's line numbering, undecodable lines included
    let events: Vec<(usize, EventLine)> = split_lines(&raw)
        .into_iter()
        .enumerate()
        .filter_map(|(i, line)| {
            let event: EventLine = serde_json::from_str(line.ok()?).ok()?;
            Some((i, event))
        })
        .collect();

    let context = ContextIndex::build(&events);
    for exchange in correlate(&events) {
        persist_exchange(writer, &exchange, &context, config)?;
    }

    for (_, event) in &events {
        if !event.is_accepted() || event.role() != Role::Assistant {
            continue;
        }
        let text = prose_text(event);
        if text.trim().is_empty() {
            continue;
        }
        let trailing = tail_chars(&text, config.context_chars).to_string();
        scan_text(writer, &text, None, Some(trailing), config)?;
    }

    Ok(())
}

fn extract_from_entries<S: Store + ?Sized>(
    writer: &mut ArtifactWriter<'_, S>,
    config: &ExtractionConfig,
) -> Result<()> {
    let filter = EntryFilter {
        role: None,
        page: Page::unbounded(),
    };
    let entries = writer.store.list_entries(writer.conversation_id, &filter)?;

    for (i, entry) in entries.iter().enumerate() {
        if entry.role != Role::Assistant {
            continue;
        }
        let previous = i
            .checked_sub(1)
            .map(|p| tail_chars(&entries[p].content, config.context_chars).to_string());
        scan_text(writer, &entry.content, Some(entry.id), previous, config)?;
    }

    Ok(())
}

fn persist_exchange<S: Store + ?Sized>(
    writer: &mut ArtifactWriter<'_, S>,
    exchange: &ToolExchange,
    context: &ContextIndex,
    config: &ExtractionConfig,
) -> Result<()> {
    let call = &exchange.call;

    let (outcome, tier, category) = match &exchange.result {
        None => (Outcome::Pending, None, None),
        Some(result) => {
            let tier = tier_output(&result.content, result.is_error, config);
            if result.is_error {
                let raw = stringify_value(&result.content);
                let output = tier.full.as_deref().unwrap_or(&tier.summary);
                let category = classify_error(output, Some(&raw));
                (Outcome::Error, Some(tier), Some(category))
            } else {
                (Outcome::Success, Some(tier), None)
            }
        }
    };

    let input_json = serde_json::to_string(&call.input)?;
    let call_hash = composite_hash(&[call.id.as_str(), input_json.as_str()]);
    if !writer.seen(&call_hash)? {
        let mut artifact = writer.artifact(ArtifactKind::ToolCall, input_json, call_hash);
        artifact.label = Some(call.name.clone());
        artifact.outcome = outcome;
        apply_tier(&mut artifact, tier.as_ref());
        artifact.error_category = category;
        artifact.context = context.preceding(call.line_index, config.context_chars);
        artifact.metadata = json!({
            "tool_use_id": call.id,
            "line_index": call.line_index,
            "timestamp": call.timestamp,
            "summary": generate_tool_summary(&call.name, &call.input),
        });
        writer.insert(artifact)?;
    }

    let (Some(result), Some(tier)) = (&exchange.result, tier.as_ref()) else {
        return Ok(());
    };
    let result_json = serde_json::to_string(&result.content)?;
    let result_hash = composite_hash(&[call.id.as_str(), result_json.as_str()]);
    if !writer.seen(&result_hash)? {
        let mut artifact =
            writer.artifact(ArtifactKind::ToolResult, tier.summary.clone(), result_hash);
        artifact.label = Some(call.name.clone());
        artifact.outcome = outcome;
        apply_tier(&mut artifact, Some(tier));
        artifact.error_category = category;
        artifact.context = context.preceding(result.line_index, config.context_chars);
        artifact.metadata = json!({
            "tool_use_id": call.id,
            "line_index": result.line_index,
        });
        writer.insert(artifact)?;
    }

    Ok(())
}

fn apply_tier(artifact: &mut NewArtifact, tier: Option<&TieredOutput>) {
    let Some(tier) = tier else {
        return;
    };
    artifact.output_summary = Some(tier.summary.clone());
    artifact.output_full = tier.full.clone();
    artifact.output_size = tier.size as i64;
    artifact.output_truncated = tier.truncated;
}

/// Code fences and (optionally) JSON objects in one piece of assistant text.
fn scan_text<S: Store + ?Sized>(
    writer: &mut ArtifactWriter<'_, S>,
    text: &str,
    entry_id: Option<i64>,
    context: Option<String>,
    config: &ExtractionConfig,
) -> Result<()> {
    for block in scan::find_code_blocks(text) {
        let hash = content_hash(&block.body);
        if writer.seen(&hash)? {
            continue;
        }
        let language = block.language_or_default().to_string();
        let mut artifact = writer.artifact(ArtifactKind::CodeBlock, block.body, hash);
        artifact.entry_id = entry_id;
        artifact.label = Some(language.clone());
        artifact.context = context.clone();
        artifact.metadata = json!({ "language": language });
        writer.insert(artifact)?;
    }

    if !config.scan_json_objects {
        return Ok(());
    }

    for object in scan::find_json_objects(text) {
        let key_count = object.len();
        let compact = serde_json::Value::Object(object).to_string();
        // Kept apart from code-block hashes: a fenced JSON body is both
        let hash = composite_hash(&[ArtifactKind::JsonObject.as_str(), compact.as_str()]);
        if writer.seen(&hash)? {
            continue;
        }
        let mut artifact = writer.artifact(ArtifactKind::JsonObject, compact, hash);
        artifact.entry_id = entry_id;
        artifact.context = context.clone();
        artifact.metadata = json!({ "keys": key_count });
        writer.insert(artifact)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::ephemeral::EphemeralStore;
    use crate::parser::parse_file;
    use crate::query::ArtifactFilter;
    use crate::store::testing::UncheckedStore;
    use std::io::Write;

    const USER: &str = r#"{"type":"user","sessionId":"s1","timestamp":"2024-01-01T00:00:00Z","message":{"role":"user","content":"Show me a.rs"}}"#;
    const CALL: &str = r#"{"type":"assistant","sessionId":"s1","timestamp":"2024-01-01T00:00:05Z","message":{"role":"assistant","content":[{"type":"tool_use","id":"t1","name":"Read","input":{"file_path":"/src/a.rs"}}]}}"#;
    const RESULT: &str = r#"{"type":"user","sessionId":"s1","timestamp":"2024-01-01T00:00:06Z","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"t1","content":"fn a() {}"}]}}"#;

    fn write_lines(path: &Path, lines: &[&str]) {
        let mut file = std::fs::File::create(path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
    }

    fn parsed<S: Store>(store: &S, dir: &tempfile::TempDir, lines: &[&str]) -> String {
        let path = dir.path().join("session.jsonl");
        write_lines(&path, lines);
        parse_file(store, &path, None).unwrap().conversation_id.unwrap()
    }

    #[test]
    fn test_tool_call_and_result_extracted_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = EphemeralStore::new();
        let id = parsed(&store, &dir, &[USER, CALL, RESULT]);
        let config = ExtractionConfig::default();

        let outcome = extract_artifacts(&store, &id, &config).unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.tool_calls, 1);
        assert_eq!(outcome.tool_results, 1);
        assert_eq!(outcome.skipped, 0);

        let calls = store
            .list_artifacts(
                &id,
                &ArtifactFilter {
                    kind: Some(ArtifactKind::ToolCall),
                    ..Default::default()
                },
            )
            .unwrap();
        let call = &calls[0];
        assert_eq!(call.label.as_deref(), Some("Read"));
        assert_eq!(call.outcome, Outcome::Success);
        assert_eq!(call.output_summary.as_deref(), Some("fn a() {}"));
        assert_eq!(call.output_full.as_deref(), Some("fn a() {}"));
        assert_eq!(call.context.as_deref(), Some("Show me a.rs"));
        assert_eq!(call.metadata["summary"], "Read a.rs");
        assert_eq!(call.metadata["tool_use_id"], "t1");

        let again = extract_artifacts(&store, &id, &config).unwrap();
        assert_eq!(again.tool_calls, 0);
        assert_eq!(again.tool_results, 0);
        assert_eq!(again.skipped, 2);
    }

    #[test]
    fn test_pending_and_error_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let store = Database::in_memory().unwrap();
        let failing_call = r#"{"type":"assistant","message":{"role":"assistant","content":[{"type":"tool_use","id":"t2","name":"Bash","input":{"command":"cat /root/secret"}}]}}"#;
        let failing_result = r#"{"type":"user","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"t2","content":"cat: /root/secret: Permission denied","is_error":true}]}}"#;
        let id = parsed(&store, &dir, &[CALL, failing_call, failing_result]);

        let outcome = extract_artifacts(&store, &id, &ExtractionConfig::default()).unwrap();
        assert_eq!(outcome.tool_calls, 2);
        assert_eq!(outcome.tool_results, 1);

        let calls = store
            .list_artifacts(
                &id,
                &ArtifactFilter {
                    kind: Some(ArtifactKind::ToolCall),
                    ..Default::default()
                },
            )
            .unwrap();
        let read = calls.iter().find(|a| a.label.as_deref() == Some("Read")).unwrap();
        assert_eq!(read.outcome, Outcome::Pending);
        assert!(read.output_summary.is_none());

        let bash = calls.iter().find(|a| a.label.as_deref() == Some("Bash")).unwrap();
        assert_eq!(bash.outcome, Outcome::Error);
        assert_eq!(bash.error_category, Some(ErrorCategory::Permission));
    }

    #[test]
    fn test_large_error_output_kept_in_full() {
        let dir = tempfile::tempdir().unwrap();
        let store = EphemeralStore::new();
        let big = "x".repeat(20_000);
        let ok_result = format!(
            r#"{{"type":"user","message":{{"role":"user","content":[{{"type":"tool_result","tool_use_id":"t1","content":"{}"}}]}}}}"#,
            big
        );
        let err_call = r#"{"type":"assistant","message":{"role":"assistant","content":[{"type":"tool_use","id":"t3","name":"Bash","input":{"command":"make"}}]}}"#;
        let err_result = format!(
            r#"{{"type":"user","message":{{"role":"user","content":[{{"type":"tool_result","tool_use_id":"t3","content":"{}","is_error":true}}]}}}}"#,
            big
        );
        let id = parsed(&store, &dir, &[CALL, &ok_result, err_call, &err_result]);
        extract_artifacts(&store, &id, &ExtractionConfig::default()).unwrap();

        let results = store
            .list_artifacts(
                &id,
                &ArtifactFilter {
                    kind: Some(ArtifactKind::ToolResult),
                    ..Default::default()
                },
            )
            .unwrap();
        let ok = results.iter().find(|a| a.label.as_deref() == Some("Read")).unwrap();
        assert!(ok.output_truncated);
        assert!(ok.output_full.is_none());
        assert_eq!(ok.output_size, 20_000);
        assert_eq!(ok.output_summary.as_ref().map(|s| s.len()), Some(500));

        let err = results.iter().find(|a| a.label.as_deref() == Some("Bash")).unwrap();
        assert!(!err.output_truncated);
        assert_eq!(err.output_full.as_ref().map(|s| s.len()), Some(20_000));
        assert_eq!(err.error_category, Some(ErrorCategory::Unknown));
    }

    #[test]
    fn test_result_arriving_later_is_added() {
        let dir = tempfile::tempdir().unwrap();
        let store = EphemeralStore::new();
        let id = parsed(&store, &dir, &[USER, CALL]);
        let config = ExtractionConfig::default();
        assert_eq!(extract_artifacts(&store, &id, &config).unwrap().tool_calls, 1);

        parsed(&store, &dir, &[USER, CALL, RESULT]);
        let outcome = extract_artifacts(&store, &id, &config).unwrap();
        assert_eq!(outcome.tool_calls, 0);
        assert_eq!(outcome.tool_results, 1);
        assert_eq!(outcome.skipped, 1);
    }

    #[test]
    fn test_code_blocks_and_json_from_assistant_text() {
        let dir = tempfile::tempdir().unwrap();
        let store = EphemeralStore::new();
        let reply = r#"{"type":"assistant","message":{"role":"assistant","content":"Try:\n```python\nprint(1)\n```\nor the same in a shell:\n```sh\nprint(1)\n```\nConfig: {\"debug\": true}"}}"#;
        let id = parsed(&store, &dir, &[USER, reply]);

        let outcome = extract_artifacts(&store, &id, &ExtractionConfig::default()).unwrap();
        assert_eq!(outcome.code_blocks, 1);
        assert_eq!(outcome.json_objects, 1);
        assert_eq!(outcome.skipped, 1);

        let blocks = store
            .list_artifacts(
                &id,
                &ArtifactFilter {
                    kind: Some(ArtifactKind::CodeBlock),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(blocks[0].content, "print(1)");
        assert_eq!(blocks[0].label.as_deref(), Some("python"));
        assert!(blocks[0].context.as_deref().unwrap().ends_with("{\"debug\": true}"));
    }

    #[test]
    fn test_fenced_json_yields_code_block_and_json_object() {
        let dir = tempfile::tempdir().unwrap();
        let store = EphemeralStore::new();
        let reply = r#"{"type":"assistant","message":{"role":"assistant","content":"Config:\n```json\n{\"a\":1}\n```"}}"#;
        let id = parsed(&store, &dir, &[reply]);
        let config = ExtractionConfig::default();

        let outcome = extract_artifacts(&store, &id, &config).unwrap();
        assert_eq!(outcome.code_blocks, 1);
        assert_eq!(outcome.json_objects, 1);
        assert_eq!(outcome.skipped, 0);

        let again = extract_artifacts(&store, &id, &config).unwrap();
        assert_eq!(again.code_blocks + again.json_objects, 0);
        assert_eq!(again.skipped, 2);
    }

    #[test]
    fn test_duplicates_at_insert_count_as_skips() {
        let dir = tempfile::tempdir().unwrap();
        let store = UncheckedStore(EphemeralStore::new());
        let id = parsed(&store, &dir, &[USER, CALL, RESULT]);
        let config = ExtractionConfig::default();

        let first = extract_artifacts(&store, &id, &config).unwrap();
        assert_eq!(first.tool_calls, 1);
        assert_eq!(first.tool_results, 1);

        let again = extract_artifacts(&store, &id, &config).unwrap();
        assert!(again.success);
        assert_eq!(again.tool_calls, 0);
        assert_eq!(again.tool_results, 0);
        assert_eq!(again.skipped, 2);
    }

    #[test]
    fn test_undecodable_line_keeps_line_indices() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.jsonl");
        let mut bytes = Vec::new();
        for line in [USER.as_bytes(), &b"\xff\xfe"[..], CALL.as_bytes(), RESULT.as_bytes()] {
            bytes.extend_from_slice(line);
            bytes.push(b'\n');
        }
        std::fs::write(&path, bytes).unwrap();

        let store = EphemeralStore::new();
        let id = parse_file(&store, &path, None).unwrap().conversation_id.unwrap();
        let outcome = extract_artifacts(&store, &id, &ExtractionConfig::default()).unwrap();
        assert_eq!(outcome.tool_calls, 1);
        assert_eq!(outcome.tool_results, 1);

        let calls = store
            .list_artifacts(
                &id,
                &ArtifactFilter {
                    kind: Some(ArtifactKind::ToolCall),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(calls[0].metadata["line_index"], 2);
        assert_eq!(calls[0].context.as_deref(), Some("Show me a.rs"));
    }

    #[test]
    fn test_json_scanning_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let store = EphemeralStore::new();
        let reply = r#"{"type":"assistant","message":{"role":"assistant","content":"{\"a\": 1}"}}"#;
        let id = parsed(&store, &dir, &[reply]);
        let config = ExtractionConfig {
            scan_json_objects: false,
            ..Default::default()
        };
        let outcome = extract_artifacts(&store, &id, &config).unwrap();
        assert_eq!(outcome.json_objects, 0);
    }

    #[test]
    fn test_stored_entry_mode_when_source_is_gone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.txt");
        std::fs::write(
            &path,
            "User: how do I list files?\nAssistant: Use\n```\nls -la\n```\n",
        )
        .unwrap();

        let store = EphemeralStore::new();
        let id = parse_file(&store, &path, None).unwrap().conversation_id.unwrap();
        std::fs::remove_file(&path).unwrap();

        let outcome = extract_artifacts(&store, &id, &ExtractionConfig::default()).unwrap();
        assert_eq!(outcome.code_blocks, 1);
        assert_eq!(outcome.tool_calls, 0);

        let blocks = store.list_artifacts(&id, &ArtifactFilter::default()).unwrap();
        assert_eq!(blocks[0].label.as_deref(), Some("text"));
        assert_eq!(blocks[0].context.as_deref(), Some("how do I list files?"));
        assert!(blocks[0].entry_id.is_some());
    }

    #[test]
    fn test_unknown_conversation() {
        let store = EphemeralStore::new();
        let err = extract_artifacts(&store, "nope", &ExtractionConfig::default()).unwrap_err();
        assert!(matches!(err, CoreError::ConversationNotFound(_)));
    }
}

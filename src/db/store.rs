//! `Store` implementation backed by SQLite.

use super::Database;
use crate::error::Result;
use crate::models::*;
use crate::query::{ArtifactFilter, ArtifactSearch, ArtifactStats, ConversationFilter, EntryFilter};
use crate::store::Store;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};

const CONVERSATION_COLUMNS: &str = "id, session_id, source_path, source_format, project,
    started_at, ended_at, duration_ms, message_count, assistant_version, model, git_branch,
    cwd, created_at";

const ENTRY_COLUMNS: &str =
    "id, conversation_id, sequence_num, role, content, timestamp, content_hash";

const ARTIFACT_COLUMNS: &str = "a.id, a.conversation_id, a.entry_id, a.artifact_type, a.label,
    a.content, a.content_hash, a.outcome, a.output_summary, a.output_full, a.output_size,
    a.output_truncated, a.error_category, a.context, a.metadata, a.created_at";

/// Decode a text column through one of the model `parse` functions.
fn parse_column<T>(idx: usize, value: String, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    parse(&value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unexpected value '{}'", value).into(),
        )
    })
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        session_id: row.get(1)?,
        source_path: row.get(2)?,
        source_format: parse_column(3, row.get(3)?, SourceFormat::parse)?,
        project: row.get(4)?,
        started_at: row.get(5)?,
        ended_at: row.get(6)?,
        duration_ms: row.get(7)?,
        message_count: row.get(8)?,
        environment: Environment {
            assistant_version: row.get(9)?,
            model: row.get(10)?,
            git_branch: row.get(11)?,
            cwd: row.get(12)?,
        },
        created_at: row.get(13)?,
    })
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<Entry> {
    Ok(Entry {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sequence: row.get(2)?,
        role: parse_column(3, row.get(3)?, Role::parse)?,
        content: row.get(4)?,
        timestamp: row.get(5)?,
        content_hash: row.get(6)?,
    })
}

fn artifact_from_row(row: &Row<'_>) -> rusqlite::Result<Artifact> {
    let category: Option<String> = row.get(12)?;
    let metadata: String = row.get(14)?;
    Ok(Artifact {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        entry_id: row.get(2)?,
        kind: parse_column(3, row.get(3)?, ArtifactKind::parse)?,
        label: row.get(4)?,
        content: row.get(5)?,
        content_hash: row.get(6)?,
        outcome: parse_column(7, row.get(7)?, Outcome::parse)?,
        output_summary: row.get(8)?,
        output_full: row.get(9)?,
        output_size: row.get(10)?,
        output_truncated: row.get(11)?,
        error_category: category
            .map(|c| parse_column(12, c, ErrorCategory::parse))
            .transpose()?,
        context: row.get(13)?,
        metadata: serde_json::from_str(&metadata).unwrap_or_else(|_| serde_json::json!({})),
        created_at: row.get(15)?,
    })
}

/// Map a UNIQUE constraint violation to `Duplicate`; anything else propagates.
fn insert_outcome(conn: &Connection, result: rusqlite::Result<usize>) -> Result<InsertOutcome> {
    match result {
        Ok(_) => Ok(InsertOutcome::Inserted(conn.last_insert_rowid())),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Ok(InsertOutcome::Duplicate)
        }
        Err(e) => Err(e.into()),
    }
}

fn query_all<T>(
    conn: &Connection,
    sql: &str,
    params: &[Box<dyn ToSql>],
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>> {
    let params_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params_refs.as_slice(), map)?
        .collect::<rusqlite::Result<Vec<T>>>()?;
    Ok(rows)
}

impl Database {
    fn conversation_where(
        conn: &Connection,
        clause: &str,
        value: &str,
    ) -> Result<Option<Conversation>> {
        let sql = format!(
            "SELECT {} FROM conversations WHERE {} = ?",
            CONVERSATION_COLUMNS, clause
        );
        Ok(conn
            .query_row(&sql, [value], conversation_from_row)
            .optional()?)
    }
}

impl Store for Database {
    fn get_checkpoint(&self, file_path: &str) -> Result<Option<Checkpoint>> {
        let conn = self.conn();
        Ok(conn
            .query_row(
                "SELECT file_path, line_count, content_hash, last_parsed_at
                 FROM parse_checkpoints WHERE file_path = ?",
                [file_path],
                |row| {
                    Ok(Checkpoint {
                        file_path: row.get(0)?,
                        line_count: row.get(1)?,
                        content_hash: row.get(2)?,
                        last_parsed_at: row.get(3)?,
                    })
                },
            )
            .optional()?)
    }

    fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO parse_checkpoints (file_path, line_count, content_hash, last_parsed_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(file_path) DO UPDATE SET
                line_count = ?2,
                content_hash = ?3,
                last_parsed_at = ?4",
            params![
                checkpoint.file_path,
                checkpoint.line_count,
                checkpoint.content_hash,
                checkpoint.last_parsed_at,
            ],
        )?;
        Ok(())
    }

    fn get_conversation(&self, id: &str) -> Result<Option<Conversation>> {
        Self::conversation_where(&self.conn(), "id", id)
    }

    fn find_conversation_by_session(&self, session_id: &str) -> Result<Option<Conversation>> {
        Self::conversation_where(&self.conn(), "session_id", session_id)
    }

    fn find_or_create_conversation(&self, new: NewConversation) -> Result<Conversation> {
        let conn = self.conn();
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO conversations (
                id, session_id, source_path, source_format, project,
                assistant_version, model, git_branch, cwd, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                id,
                new.session_id,
                new.source_path,
                new.source_format.as_str(),
                new.project,
                new.environment.assistant_version,
                new.environment.model,
                new.environment.git_branch,
                new.environment.cwd,
                now,
            ],
        )?;
        if inserted > 0 {
            tracing::info!(
                "Created conversation {} for session {}",
                id,
                new.session_id
            );
        }

        Self::conversation_where(&conn, "session_id", &new.session_id)?.ok_or_else(|| {
            crate::error::CoreError::Parser(format!(
                "conversation for session {} vanished after insert",
                new.session_id
            ))
        })
    }

    fn set_project_if_missing(&self, conversation_id: &str, project: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE conversations SET project = ?1 WHERE id = ?2 AND project IS NULL",
            params![project, conversation_id],
        )?;
        Ok(())
    }

    fn update_conversation_stats(
        &self,
        conversation_id: &str,
        stats: &ConversationStats,
    ) -> Result<()> {
        self.conn().execute(
            "UPDATE conversations SET
                started_at = ?1,
                ended_at = ?2,
                duration_ms = ?3,
                message_count = ?4
             WHERE id = ?5",
            params![
                stats.started_at,
                stats.ended_at,
                stats.duration_ms,
                stats.message_count,
                conversation_id,
            ],
        )?;
        Ok(())
    }

    fn entry_exists(&self, conversation_id: &str, content_hash: &str) -> Result<bool> {
        let conn = self.conn();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM entries WHERE conversation_id = ?1 AND content_hash = ?2)",
            params![conversation_id, content_hash],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn insert_entry(&self, entry: &NewEntry) -> Result<InsertOutcome> {
        let conn = self.conn();
        // Sequence is computed in the same statement so concurrent writers cannot reuse it
        let result = conn.execute(
            "INSERT INTO entries (conversation_id, sequence_num, role, content, timestamp, content_hash)
             SELECT ?1, COALESCE(MAX(sequence_num), -1) + 1, ?2, ?3, ?4, ?5
             FROM entries WHERE conversation_id = ?1",
            params![
                entry.conversation_id,
                entry.role.as_str(),
                entry.content,
                entry.timestamp,
                entry.content_hash,
            ],
        );
        insert_outcome(&conn, result)
    }

    fn entry_timestamps(&self, conversation_id: &str) -> Result<Vec<Option<String>>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT timestamp FROM entries WHERE conversation_id = ? ORDER BY sequence_num",
        )?;
        let timestamps = stmt
            .query_map([conversation_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<Option<String>>>>()?;
        Ok(timestamps)
    }

    fn artifact_exists(&self, conversation_id: &str, content_hash: &str) -> Result<bool> {
        let conn = self.conn();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM artifacts WHERE conversation_id = ?1 AND content_hash = ?2)",
            params![conversation_id, content_hash],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn insert_artifact(&self, artifact: &NewArtifact) -> Result<InsertOutcome> {
        let metadata = serde_json::to_string(&artifact.metadata)?;
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.conn();
        let result = conn.execute(
            "INSERT INTO artifacts (
                conversation_id, entry_id, artifact_type, label, content, content_hash,
                outcome, output_summary, output_full, output_size, output_truncated,
                error_category, context, metadata, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                artifact.conversation_id,
                artifact.entry_id,
                artifact.kind.as_str(),
                artifact.label,
                artifact.content,
                artifact.content_hash,
                artifact.outcome.as_str(),
                artifact.output_summary,
                artifact.output_full,
                artifact.output_size,
                artifact.output_truncated,
                artifact.error_category.map(|c| c.as_str()),
                artifact.context,
                metadata,
                now,
            ],
        );
        insert_outcome(&conn, result)
    }

    fn list_conversations(&self, filter: &ConversationFilter) -> Result<Vec<Conversation>> {
        let mut sql = format!("SELECT {} FROM conversations c WHERE 1 = 1", CONVERSATION_COLUMNS);
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(ref project) = filter.project {
            sql.push_str(" AND c.project = ?");
            params.push(Box::new(project.clone()));
        }
        if let Some(since) = filter.started_after {
            sql.push_str(" AND c.started_at >= ?");
            params.push(Box::new(since.to_rfc3339()));
        }
        if filter.has_errors {
            sql.push_str(
                " AND EXISTS (SELECT 1 FROM artifacts a
                              WHERE a.conversation_id = c.id AND a.outcome = 'error')",
            );
        }
        sql.push_str(" ORDER BY COALESCE(c.started_at, c.created_at) DESC LIMIT ? OFFSET ?");
        params.push(Box::new(filter.page.limit as i64));
        params.push(Box::new(filter.page.offset as i64));

        query_all(&self.conn(), &sql, &params, conversation_from_row)
    }

    fn list_entries(&self, conversation_id: &str, filter: &EntryFilter) -> Result<Vec<Entry>> {
        let mut sql = format!(
            "SELECT {} FROM entries WHERE conversation_id = ?",
            ENTRY_COLUMNS
        );
        let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(conversation_id.to_string())];

        if let Some(role) = filter.role {
            sql.push_str(" AND role = ?");
            params.push(Box::new(role.as_str()));
        }
        sql.push_str(" ORDER BY sequence_num ASC LIMIT ? OFFSET ?");
        params.push(Box::new(filter.page.limit as i64));
        params.push(Box::new(filter.page.offset as i64));

        query_all(&self.conn(), &sql, &params, entry_from_row)
    }

    fn list_artifacts(
        &self,
        conversation_id: &str,
        filter: &ArtifactFilter,
    ) -> Result<Vec<Artifact>> {
        let mut sql = format!(
            "SELECT {} FROM artifacts a WHERE a.conversation_id = ?",
            ARTIFACT_COLUMNS
        );
        let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(conversation_id.to_string())];

        if let Some(kind) = filter.kind {
            sql.push_str(" AND a.artifact_type = ?");
            params.push(Box::new(kind.as_str()));
        }
        if let Some(ref tool) = filter.tool_name {
            sql.push_str(" AND a.label = ? AND a.artifact_type IN ('tool_call', 'tool_result')");
            params.push(Box::new(tool.clone()));
        }
        if let Some(outcome) = filter.outcome {
            sql.push_str(" AND a.outcome = ?");
            params.push(Box::new(outcome.as_str()));
        }
        sql.push_str(" ORDER BY a.id ASC LIMIT ? OFFSET ?");
        params.push(Box::new(filter.page.limit as i64));
        params.push(Box::new(filter.page.offset as i64));

        query_all(&self.conn(), &sql, &params, artifact_from_row)
    }

    fn search_artifacts(&self, search: &ArtifactSearch) -> Result<Vec<Artifact>> {
        let escaped = search
            .text
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let pattern = format!("%{}%", escaped);

        let mut sql = format!(
            "SELECT {} FROM artifacts a JOIN conversations c ON c.id = a.conversation_id
             WHERE (a.content LIKE ?1 ESCAPE '\\' OR a.output_summary LIKE ?1 ESCAPE '\\')",
            ARTIFACT_COLUMNS
        );
        let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(pattern)];

        if let Some(ref project) = search.project {
            sql.push_str(&format!(" AND c.project = ?{}", params.len() + 1));
            params.push(Box::new(project.clone()));
        }
        if let Some(kind) = search.kind {
            sql.push_str(&format!(" AND a.artifact_type = ?{}", params.len() + 1));
            params.push(Box::new(kind.as_str()));
        }
        sql.push_str(&format!(
            " ORDER BY a.id DESC LIMIT ?{} OFFSET ?{}",
            params.len() + 1,
            params.len() + 2
        ));
        params.push(Box::new(search.page.limit as i64));
        params.push(Box::new(search.page.offset as i64));

        query_all(&self.conn(), &sql, &params, artifact_from_row)
    }

    fn artifact_stats(&self, conversation_id: Option<&str>) -> Result<ArtifactStats> {
        let conn = self.conn();
        let mut sql = String::from("SELECT artifact_type, outcome, error_category FROM artifacts");
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(id) = conversation_id {
            sql.push_str(" WHERE conversation_id = ?");
            params.push(Box::new(id.to_string()));
        }

        let rows = query_all(&conn, &sql, &params, |row| {
            let category: Option<String> = row.get(2)?;
            Ok((
                parse_column(0, row.get(0)?, ArtifactKind::parse)?,
                parse_column(1, row.get(1)?, Outcome::parse)?,
                category.and_then(|c| ErrorCategory::parse(&c)),
            ))
        })?;

        let mut stats = ArtifactStats::default();
        for (kind, outcome, category) in rows {
            stats.record(kind, outcome, category);
        }
        Ok(stats)
    }
}

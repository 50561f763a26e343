//! SQLite schema for Yotrace
//!
//! Uniqueness constraints here are the correctness backstop for deduplication:
//! a racing duplicate insert fails with a constraint violation, which the store
//! reports as a duplicate rather than an error.

use rusqlite::{Connection, Result};

/// Initialize the database with required tables
pub fn init_db(conn: &Connection) -> Result<()> {
    // Enable foreign key enforcement
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    // Conversations - one row per logical session
    conn.execute(
        "CREATE TABLE IF NOT EXISTS conversations (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL UNIQUE,
            source_path TEXT NOT NULL,
            source_format TEXT NOT NULL CHECK (source_format IN ('event_log', 'plain_text')),
            project TEXT,
            started_at TEXT,
            ended_at TEXT,
            duration_ms INTEGER,
            message_count INTEGER NOT NULL DEFAULT 0,
            assistant_version TEXT,
            model TEXT,
            git_branch TEXT,
            cwd TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // Entries - append-only normalized messages
    conn.execute(
        "CREATE TABLE IF NOT EXISTS entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            conversation_id TEXT NOT NULL,
            sequence_num INTEGER NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('user', 'assistant', 'tool', 'system')),
            content TEXT NOT NULL,
            timestamp TEXT,
            content_hash TEXT NOT NULL,
            FOREIGN KEY (conversation_id) REFERENCES conversations(id),
            UNIQUE(conversation_id, content_hash)
        )",
        [],
    )?;

    // Artifacts - extracted on demand, never updated
    conn.execute(
        "CREATE TABLE IF NOT EXISTS artifacts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            conversation_id TEXT NOT NULL,
            entry_id INTEGER,
            artifact_type TEXT NOT NULL CHECK (
                artifact_type IN ('code_block', 'tool_call', 'tool_result', 'json_object')
            ),
            label TEXT,
            content TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            outcome TEXT NOT NULL CHECK (outcome IN ('success', 'error', 'pending', 'none')),
            output_summary TEXT,
            output_full TEXT,
            output_size INTEGER NOT NULL DEFAULT 0,
            output_truncated BOOLEAN NOT NULL DEFAULT 0,
            error_category TEXT,
            context TEXT,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            FOREIGN KEY (conversation_id) REFERENCES conversations(id),
            FOREIGN KEY (entry_id) REFERENCES entries(id),
            UNIQUE(conversation_id, content_hash)
        )",
        [],
    )?;

    // Parse checkpoints - one per source file
    conn.execute(
        "CREATE TABLE IF NOT EXISTS parse_checkpoints (
            file_path TEXT PRIMARY KEY,
            line_count INTEGER NOT NULL DEFAULT 0,
            content_hash TEXT,
            last_parsed_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entries_conversation_seq
         ON entries(conversation_id, sequence_num)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_artifacts_conversation_type
         ON artifacts(conversation_id, artifact_type)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_artifacts_outcome ON artifacts(outcome)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_conversations_project ON conversations(project)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_db() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(init_db(&conn).is_ok());

        let table_count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();

        assert_eq!(table_count, 4);
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        assert!(init_db(&conn).is_ok());
    }
}

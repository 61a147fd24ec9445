//! Database schema definitions.

use rusqlite::{Connection, Result};

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema for the kindle2readwise database.
///
/// Two logical tables: `highlights` keyed by content fingerprint, and
/// `export_sessions` keyed by id. Timestamps are ISO-8601 TEXT.
pub const SCHEMA_SQL: &str = r"
-- ====================
-- Schema Version Tracking
-- ====================

CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TEXT NOT NULL
);

-- ====================
-- Core Tables
-- ====================

-- Highlights: every clipping ever exported, keyed by fingerprint
CREATE TABLE IF NOT EXISTS highlights (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    fingerprint TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    author TEXT NOT NULL DEFAULT '',
    text TEXT NOT NULL,
    location TEXT,
    date_highlighted TEXT,
    date_exported TEXT NOT NULL,
    readwise_id TEXT,
    status TEXT NOT NULL CHECK (status IN ('success', 'error'))
);

CREATE INDEX IF NOT EXISTS idx_highlights_date_exported ON highlights(date_exported);
CREATE INDEX IF NOT EXISTS idx_highlights_title_author ON highlights(title, author);

-- Export Sessions: one row per export run
CREATE TABLE IF NOT EXISTS export_sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    start_time TEXT NOT NULL,
    end_time TEXT,
    source_file TEXT NOT NULL,
    highlights_total INTEGER NOT NULL DEFAULT 0,
    highlights_new INTEGER NOT NULL DEFAULT 0,
    highlights_dupe INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'running'
        CHECK (status IN ('running', 'success', 'partial', 'error'))
);

CREATE INDEX IF NOT EXISTS idx_sessions_start_time ON export_sessions(start_time DESC);
CREATE INDEX IF NOT EXISTS idx_sessions_status ON export_sessions(status);
";

/// Apply the schema to the database.
///
/// Idempotent because all statements use `IF NOT EXISTS`.
///
/// # Errors
///
/// Returns an error if the SQL execution fails or pragmas cannot be set.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;

    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().to_rfc3339()
        ],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_schema() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).expect("Failed to apply schema");

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();

        assert!(tables.contains(&"highlights".to_string()));
        assert!(tables.contains(&"export_sessions".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).expect("First apply failed");
        apply_schema(&conn).expect("Second apply failed");
    }

    #[test]
    fn test_status_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO highlights (fingerprint, title, text, date_exported, status)
             VALUES ('fp1', 'T', 'x', '2025-01-01T00:00:00Z', 'success')",
            [],
        );
        assert!(result.is_ok());

        let result = conn.execute(
            "INSERT INTO highlights (fingerprint, title, text, date_exported, status)
             VALUES ('fp2', 'T', 'x', '2025-01-01T00:00:00Z', 'pending')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_fingerprint_unique() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let insert = "INSERT INTO highlights (fingerprint, title, text, date_exported, status)
                      VALUES ('same', 'T', 'x', '2025-01-01T00:00:00Z', 'success')";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }
}

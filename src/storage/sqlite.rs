//! SQLite storage implementation.
//!
//! Single connection owning both logical tables: the highlight
//! deduplication store and the export session ledger. All mutating
//! operations run inside IMMEDIATE transactions so a concurrent run
//! against the same database file surfaces as a lock error instead of
//! interleaved writes.

use crate::error::{Error, Result};
use crate::model::{ExportStatus, SessionStatus};
use crate::storage::schema::apply_schema;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// A highlight row as persisted in the database.
#[derive(Debug, Clone, Serialize)]
pub struct Highlight {
    pub id: i64,
    pub fingerprint: String,
    pub title: String,
    pub author: String,
    pub text: String,
    pub location: Option<String>,
    pub date_highlighted: Option<String>,
    pub date_exported: String,
    pub readwise_id: Option<String>,
    pub status: ExportStatus,
}

/// Input for inserting or force-updating a highlight row.
///
/// `date_exported` is stamped inside the store at write time.
#[derive(Debug, Clone)]
pub struct NewHighlight {
    pub fingerprint: String,
    pub title: String,
    pub author: String,
    pub text: String,
    pub location: Option<String>,
    pub date_highlighted: Option<String>,
    pub readwise_id: Option<String>,
    pub status: ExportStatus,
}

/// An export session row.
#[derive(Debug, Clone, Serialize)]
pub struct ExportSession {
    pub id: i64,
    pub start_time: String,
    pub end_time: Option<String>,
    pub source_file: String,
    pub highlights_total: i64,
    pub highlights_new: i64,
    pub highlights_dupe: i64,
    pub status: SessionStatus,
}

/// Aggregate counts recorded when a session is finalized.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SessionStats {
    pub total: i64,
    pub new: i64,
    pub duplicates: i64,
}

/// One row of the `highlights books` aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct BookSummary {
    pub title: String,
    pub author: String,
    pub highlight_count: i64,
}

/// Substring filters for highlight queries (case-insensitive).
#[derive(Debug, Clone, Default)]
pub struct HighlightFilters {
    pub title: Option<String>,
    pub author: Option<String>,
    pub text: Option<String>,
}

/// Sortable columns for highlight queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    DateExported,
    DateHighlighted,
}

impl SortField {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "date_exported" => Ok(Self::DateExported),
            "date_highlighted" => Ok(Self::DateHighlighted),
            other => Err(Error::InvalidArgument(format!(
                "unknown sort field: {other} (expected date_exported or date_highlighted)"
            ))),
        }
    }

    const fn as_column(self) -> &'static str {
        match self {
            Self::DateExported => "date_exported",
            Self::DateHighlighted => "date_highlighted",
        }
    }
}

/// Sort direction for highlight queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(Error::InvalidArgument(format!(
                "unknown sort order: {other} (expected asc or desc)"
            ))),
        }
    }

    const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Open a database at the given path, creating it and applying the
    /// schema if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or the
    /// schema fails to apply.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, Duration::from_secs(5))
    }

    /// Open a database with an explicit busy timeout.
    ///
    /// A lock still held past the timeout surfaces as
    /// [`Error::DatabaseLocked`], never as silent corruption.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_with_timeout(path: &Path, timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(timeout)?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    // ====================
    // Highlight Store
    // ====================

    /// Point lookup: has a highlight with this fingerprint been
    /// successfully exported before?
    ///
    /// Rows in `error` status do not count; a failed send must not
    /// block the retry on the next run.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn highlight_exists(&self, fingerprint: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM highlights WHERE fingerprint = ?1 AND status = 'success'",
            [fingerprint],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Insert a highlight, or update its export metadata on a retry or
    /// a forced re-export.
    ///
    /// Without `force`, an existing `success` row is left untouched and
    /// its row id returned; an existing `error` row is overwritten, so
    /// retries replace the failure record. With `force`,
    /// `date_exported`, `readwise_id`, and `status` are always
    /// overwritten. The original `date_highlighted` is preserved in
    /// both overwrite cases.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn upsert_highlight(&mut self, highlight: &NewHighlight, force: bool) -> Result<i64> {
        let now = chrono::Utc::now().to_rfc3339();
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let existing: Option<(i64, String)> = tx
            .query_row(
                "SELECT id, status FROM highlights WHERE fingerprint = ?1",
                [&highlight.fingerprint],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let id = match existing {
            Some((id, status)) if force || status == "error" => {
                tx.execute(
                    "UPDATE highlights
                     SET date_exported = ?1, readwise_id = ?2, status = ?3
                     WHERE id = ?4",
                    rusqlite::params![
                        now,
                        highlight.readwise_id,
                        highlight.status.as_str(),
                        id
                    ],
                )?;
                id
            }
            Some((id, _)) => id,
            None => {
                tx.execute(
                    "INSERT INTO highlights
                     (fingerprint, title, author, text, location, date_highlighted,
                      date_exported, readwise_id, status)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    rusqlite::params![
                        highlight.fingerprint,
                        highlight.title,
                        highlight.author,
                        highlight.text,
                        highlight.location,
                        highlight.date_highlighted,
                        now,
                        highlight.readwise_id,
                        highlight.status.as_str(),
                    ],
                )?;
                tx.last_insert_rowid()
            }
        };

        tx.commit()?;
        Ok(id)
    }

    /// Query highlights with substring filters, ordering, and
    /// limit/offset pagination.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_highlights(
        &self,
        filters: &HighlightFilters,
        sort: SortField,
        order: SortOrder,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Highlight>> {
        let (where_clause, params) = Self::build_filter_clause(filters);
        // limit/offset are integers under our control, safe to inline
        let sql = format!(
            "SELECT id, fingerprint, title, author, text, location,
                    date_highlighted, date_exported, readwise_id, status
             FROM highlights{where_clause}
             ORDER BY {} {} LIMIT {limit} OFFSET {offset}",
            sort.as_column(),
            order.as_sql(),
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            rusqlite::params_from_iter(params.iter()),
            Self::map_highlight_row,
        )?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::from)
    }

    /// Count highlights matching the filters (for pagination summaries).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_highlights(&self, filters: &HighlightFilters) -> Result<i64> {
        let (where_clause, params) = Self::build_filter_clause(filters);
        let sql = format!("SELECT COUNT(*) FROM highlights{where_clause}");
        let count = self.conn.query_row(
            &sql,
            rusqlite::params_from_iter(params.iter()),
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Total number of highlights in the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn highlight_count(&self) -> Result<i64> {
        self.count_highlights(&HighlightFilters::default())
    }

    /// Delete one highlight by row id. Returns `true` if a row was
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_highlight(&mut self, id: i64) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM highlights WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    /// Delete all highlights for a book, optionally narrowed by author.
    /// Returns the number of rows removed. Confirmation is the
    /// caller's responsibility.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_highlights_by_book(
        &mut self,
        title: &str,
        author: Option<&str>,
    ) -> Result<usize> {
        let affected = match author {
            Some(author) => self.conn.execute(
                "DELETE FROM highlights WHERE title = ?1 AND author = ?2",
                rusqlite::params![title, author],
            )?,
            None => self
                .conn
                .execute("DELETE FROM highlights WHERE title = ?1", [title])?,
        };
        Ok(affected)
    }

    /// Aggregate highlight counts per (title, author).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_books(&self) -> Result<Vec<BookSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT title, author, COUNT(*) as highlight_count
             FROM highlights
             GROUP BY title, author
             ORDER BY title COLLATE NOCASE, author COLLATE NOCASE",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(BookSummary {
                title: row.get(0)?,
                author: row.get(1)?,
                highlight_count: row.get(2)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::from)
    }

    /// Highlights exported within a time window, oldest first. Used to
    /// show the rows written during one session.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_highlights_between(&self, start: &str, end: &str) -> Result<Vec<Highlight>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, fingerprint, title, author, text, location,
                    date_highlighted, date_exported, readwise_id, status
             FROM highlights
             WHERE date_exported >= ?1 AND date_exported <= ?2
             ORDER BY date_exported",
        )?;
        let rows = stmt.query_map([start, end], Self::map_highlight_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::from)
    }

    // ====================
    // Export Session Ledger
    // ====================

    /// Begin a new export session in the `running` state.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn start_session(&mut self, source_file: &str) -> Result<i64> {
        let now = chrono::Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO export_sessions (start_time, source_file, status)
             VALUES (?1, ?2, 'running')",
            rusqlite::params![now, source_file],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(session_id = id, source_file, "export session started");
        Ok(id)
    }

    /// Finalize a session: set end time, final counts, and terminal
    /// status. Succeeds exactly once per session; a second call fails
    /// with [`Error::SessionAlreadyFinalized`].
    ///
    /// # Errors
    ///
    /// Returns an error if the session does not exist, was already
    /// finalized, or the write fails.
    pub fn finalize_session(
        &mut self,
        id: i64,
        stats: &SessionStats,
        status: SessionStatus,
    ) -> Result<()> {
        debug_assert!(status.is_terminal());
        let now = chrono::Utc::now().to_rfc3339();
        let affected = self.conn.execute(
            "UPDATE export_sessions
             SET end_time = ?1, highlights_total = ?2, highlights_new = ?3,
                 highlights_dupe = ?4, status = ?5
             WHERE id = ?6 AND status = 'running'",
            rusqlite::params![
                now,
                stats.total,
                stats.new,
                stats.duplicates,
                status.as_str(),
                id
            ],
        )?;

        if affected == 0 {
            let exists: bool = self
                .conn
                .query_row(
                    "SELECT COUNT(*) FROM export_sessions WHERE id = ?1",
                    [id],
                    |row| row.get::<_, i64>(0),
                )
                .map(|c| c > 0)?;
            return Err(if exists {
                Error::SessionAlreadyFinalized { id }
            } else {
                Error::SessionNotFound { id }
            });
        }

        tracing::debug!(session_id = id, status = %status, "export session finalized");
        Ok(())
    }

    /// Fetch one session by id.
    ///
    /// A row still marked `running` belongs to a crashed run (only one
    /// export is active at a time, and it holds the connection), so it
    /// is surfaced with status `error` rather than hidden.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_session(&self, id: i64) -> Result<Option<ExportSession>> {
        let session = self
            .conn
            .prepare(
                "SELECT id, start_time, end_time, source_file, highlights_total,
                        highlights_new, highlights_dupe, status
                 FROM export_sessions WHERE id = ?1",
            )?
            .query_row([id], Self::map_session_row)
            .optional()?;
        Ok(session.map(Self::surface_crashed))
    }

    /// Most recent sessions, newest first. Crashed (unfinalized)
    /// sessions are reported with status `error`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_sessions(&self, limit: u32) -> Result<Vec<ExportSession>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, start_time, end_time, source_file, highlights_total,
                    highlights_new, highlights_dupe, status
             FROM export_sessions
             ORDER BY start_time DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit], Self::map_session_row)?;
        let sessions = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions.into_iter().map(Self::surface_crashed).collect())
    }

    /// Total number of export sessions.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn session_count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM export_sessions", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Clear all highlight and session rows (reset-db semantics).
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn reset(&mut self) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM highlights", [])?;
        tx.execute("DELETE FROM export_sessions", [])?;
        tx.commit()?;
        tracing::info!("database reset: all highlights and sessions removed");
        Ok(())
    }

    // ====================
    // Row mapping
    // ====================

    fn map_highlight_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Highlight> {
        let status: String = row.get(9)?;
        Ok(Highlight {
            id: row.get(0)?,
            fingerprint: row.get(1)?,
            title: row.get(2)?,
            author: row.get(3)?,
            text: row.get(4)?,
            location: row.get(5)?,
            date_highlighted: row.get(6)?,
            date_exported: row.get(7)?,
            readwise_id: row.get(8)?,
            status: ExportStatus::parse(&status).map_err(|_| {
                rusqlite::Error::FromSqlConversionFailure(
                    9,
                    rusqlite::types::Type::Text,
                    format!("invalid status: {status}").into(),
                )
            })?,
        })
    }

    fn map_session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ExportSession> {
        let status: String = row.get(7)?;
        Ok(ExportSession {
            id: row.get(0)?,
            start_time: row.get(1)?,
            end_time: row.get(2)?,
            source_file: row.get(3)?,
            highlights_total: row.get(4)?,
            highlights_new: row.get(5)?,
            highlights_dupe: row.get(6)?,
            status: SessionStatus::parse(&status).map_err(|_| {
                rusqlite::Error::FromSqlConversionFailure(
                    7,
                    rusqlite::types::Type::Text,
                    format!("invalid status: {status}").into(),
                )
            })?,
        })
    }

    fn surface_crashed(mut session: ExportSession) -> ExportSession {
        if session.status == SessionStatus::Running {
            session.status = SessionStatus::Error;
        }
        session
    }

    fn build_filter_clause(filters: &HighlightFilters) -> (String, Vec<String>) {
        let mut conditions: Vec<String> = Vec::new();
        let mut params: Vec<String> = Vec::new();

        for (column, value) in [
            ("title", &filters.title),
            ("author", &filters.author),
            ("text", &filters.text),
        ] {
            if let Some(v) = value {
                conditions.push(format!(
                    "{column} LIKE ?{} COLLATE NOCASE",
                    params.len() + 1
                ));
                params.push(format!("%{v}%"));
            }
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };
        (where_clause, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::fingerprint::fingerprint;

    fn sample(fp: &str, title: &str) -> NewHighlight {
        NewHighlight {
            fingerprint: fp.to_string(),
            title: title.to_string(),
            author: "Author X".to_string(),
            text: "Sample text".to_string(),
            location: Some("10-11".to_string()),
            date_highlighted: Some("2023-01-01T01:00:00".to_string()),
            readwise_id: Some("rw-1".to_string()),
            status: ExportStatus::Success,
        }
    }

    #[test]
    fn exists_reflects_upsert() {
        let mut store = SqliteStorage::open_memory().unwrap();
        let fp = fingerprint("Book A", "Author X", "Sample text");
        assert!(!store.highlight_exists(&fp).unwrap());
        store.upsert_highlight(&sample(&fp, "Book A"), false).unwrap();
        assert!(store.highlight_exists(&fp).unwrap());
    }

    #[test]
    fn non_forced_upsert_of_duplicate_is_a_noop() {
        let mut store = SqliteStorage::open_memory().unwrap();
        let first = store.upsert_highlight(&sample("fp1", "Book"), false).unwrap();

        let mut second = sample("fp1", "Book");
        second.readwise_id = Some("rw-other".to_string());
        let id = store.upsert_highlight(&second, false).unwrap();
        assert_eq!(id, first);

        let rows = store
            .get_highlights(
                &HighlightFilters::default(),
                SortField::DateExported,
                SortOrder::Desc,
                10,
                0,
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].readwise_id.as_deref(), Some("rw-1"));
    }

    #[test]
    fn forced_upsert_overwrites_export_metadata_keeps_date_highlighted() {
        let mut store = SqliteStorage::open_memory().unwrap();
        store.upsert_highlight(&sample("fp1", "Book"), false).unwrap();

        let mut updated = sample("fp1", "Book");
        updated.date_highlighted = Some("2024-06-06T00:00:00".to_string());
        updated.readwise_id = Some("rw-2".to_string());
        updated.status = ExportStatus::Error;
        store.upsert_highlight(&updated, true).unwrap();

        let rows = store
            .get_highlights(
                &HighlightFilters::default(),
                SortField::DateExported,
                SortOrder::Desc,
                10,
                0,
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].readwise_id.as_deref(), Some("rw-2"));
        assert_eq!(rows[0].status, ExportStatus::Error);
        // original highlight date preserved
        assert_eq!(
            rows[0].date_highlighted.as_deref(),
            Some("2023-01-01T01:00:00")
        );
    }

    #[test]
    fn error_row_does_not_count_as_exported_and_is_overwritten_on_retry() {
        let mut store = SqliteStorage::open_memory().unwrap();
        let mut failed = sample("fp1", "Book");
        failed.status = ExportStatus::Error;
        failed.readwise_id = None;
        store.upsert_highlight(&failed, false).unwrap();

        assert!(!store.highlight_exists("fp1").unwrap());

        // retry without force replaces the failure record
        store.upsert_highlight(&sample("fp1", "Book"), false).unwrap();
        assert!(store.highlight_exists("fp1").unwrap());

        let rows = store
            .get_highlights(
                &HighlightFilters::default(),
                SortField::DateExported,
                SortOrder::Desc,
                10,
                0,
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, ExportStatus::Success);
        assert_eq!(rows[0].readwise_id.as_deref(), Some("rw-1"));
    }

    #[test]
    fn filters_are_case_insensitive_substrings() {
        let mut store = SqliteStorage::open_memory().unwrap();
        let mut a = sample("fp1", "Deep Work");
        a.text = "so good they can't ignore you".to_string();
        store.upsert_highlight(&a, false).unwrap();
        let mut b = sample("fp2", "Atomic Habits");
        b.author = "James Clear".to_string();
        store.upsert_highlight(&b, false).unwrap();

        let filters = HighlightFilters {
            title: Some("deep".to_string()),
            ..Default::default()
        };
        let rows = store
            .get_highlights(&filters, SortField::DateExported, SortOrder::Desc, 10, 0)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Deep Work");

        let filters = HighlightFilters {
            text: Some("IGNORE".to_string()),
            ..Default::default()
        };
        assert_eq!(store.count_highlights(&filters).unwrap(), 1);
    }

    #[test]
    fn pagination_applies_limit_and_offset() {
        let mut store = SqliteStorage::open_memory().unwrap();
        for i in 0..5 {
            store
                .upsert_highlight(&sample(&format!("fp{i}"), &format!("Book {i}")), false)
                .unwrap();
        }
        let page = store
            .get_highlights(
                &HighlightFilters::default(),
                SortField::DateExported,
                SortOrder::Asc,
                2,
                2,
            )
            .unwrap();
        assert_eq!(page.len(), 2);
    }

    #[test]
    fn delete_by_book_returns_affected_count() {
        let mut store = SqliteStorage::open_memory().unwrap();
        store.upsert_highlight(&sample("fp1", "Book A"), false).unwrap();
        store.upsert_highlight(&sample("fp2", "Book A"), false).unwrap();
        store.upsert_highlight(&sample("fp3", "Book B"), false).unwrap();

        let removed = store.delete_highlights_by_book("Book A", None).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.highlight_count().unwrap(), 1);

        assert!(!store.delete_highlight(9999).unwrap());
    }

    #[test]
    fn list_books_groups_by_title_author() {
        let mut store = SqliteStorage::open_memory().unwrap();
        store.upsert_highlight(&sample("fp1", "Book A"), false).unwrap();
        store.upsert_highlight(&sample("fp2", "Book A"), false).unwrap();
        store.upsert_highlight(&sample("fp3", "Book B"), false).unwrap();

        let books = store.list_books().unwrap();
        assert_eq!(books.len(), 2);
        assert_eq!(books[0].title, "Book A");
        assert_eq!(books[0].highlight_count, 2);
        assert_eq!(books[1].highlight_count, 1);
    }

    #[test]
    fn session_lifecycle_running_to_terminal() {
        let mut store = SqliteStorage::open_memory().unwrap();
        let id = store.start_session("/tmp/My Clippings.txt").unwrap();

        let stats = SessionStats {
            total: 10,
            new: 7,
            duplicates: 3,
        };
        store
            .finalize_session(id, &stats, SessionStatus::Success)
            .unwrap();

        let session = store.get_session(id).unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Success);
        assert_eq!(session.highlights_total, 10);
        assert_eq!(session.highlights_new, 7);
        assert_eq!(session.highlights_dupe, 3);
        assert!(session.end_time.is_some());
    }

    #[test]
    fn finalize_twice_is_rejected() {
        let mut store = SqliteStorage::open_memory().unwrap();
        let id = store.start_session("f").unwrap();
        let stats = SessionStats::default();
        store
            .finalize_session(id, &stats, SessionStatus::Error)
            .unwrap();
        let err = store
            .finalize_session(id, &stats, SessionStatus::Success)
            .unwrap_err();
        assert!(matches!(err, Error::SessionAlreadyFinalized { .. }));
    }

    #[test]
    fn finalize_unknown_session_is_not_found() {
        let mut store = SqliteStorage::open_memory().unwrap();
        let err = store
            .finalize_session(42, &SessionStats::default(), SessionStatus::Error)
            .unwrap_err();
        assert!(matches!(err, Error::SessionNotFound { id: 42 }));
    }

    #[test]
    fn crashed_session_surfaces_as_error_on_read() {
        let mut store = SqliteStorage::open_memory().unwrap();
        let id = store.start_session("f").unwrap();
        // never finalized, as after a crash

        let session = store.get_session(id).unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Error);
        assert!(session.end_time.is_none());

        let sessions = store.get_sessions(10).unwrap();
        assert_eq!(sessions[0].status, SessionStatus::Error);
    }

    #[test]
    fn reset_clears_both_tables() {
        let mut store = SqliteStorage::open_memory().unwrap();
        let fp = fingerprint("Book", "A", "text");
        store.upsert_highlight(&sample(&fp, "Book"), false).unwrap();
        store.start_session("f").unwrap();

        store.reset().unwrap();

        assert!(!store.highlight_exists(&fp).unwrap());
        assert_eq!(store.highlight_count().unwrap(), 0);
        assert_eq!(store.session_count().unwrap(), 0);
    }

    #[test]
    fn open_on_disk_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("highlights.db");
        let store = SqliteStorage::open(&path).unwrap();
        assert_eq!(store.highlight_count().unwrap(), 0);
        assert!(path.exists());
    }
}

//! Persistent storage: highlight deduplication store and export
//! session ledger, backed by SQLite.

pub mod fingerprint;
pub mod schema;
pub mod sqlite;

pub use fingerprint::fingerprint;
pub use sqlite::{
    BookSummary, ExportSession, Highlight, HighlightFilters, NewHighlight, SessionStats,
    SortField, SortOrder, SqliteStorage,
};

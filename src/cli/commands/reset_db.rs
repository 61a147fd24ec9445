//! Reset-db command implementation.

use crate::config::resolve_db_path;
use crate::error::Result;
use crate::storage::SqliteStorage;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct ResetOutput {
    highlights_removed: i64,
    sessions_removed: i64,
}

/// Execute the reset-db command.
///
/// Destructive: wipes the whole deduplication store, so the next
/// export re-sends everything. Prompts unless `--force`.
///
/// # Errors
///
/// Returns an error when the database cannot be opened or cleared.
pub fn execute(force: bool, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let db_path = resolve_db_path(db_path.cloned())?;
    let mut storage = SqliteStorage::open(&db_path)?;

    let highlights = storage.highlight_count()?;
    let sessions = storage.session_count()?;

    if !force {
        println!(
            "{}",
            format!(
                "This removes {highlights} highlight(s) and {sessions} session(s) from {}.",
                db_path.display()
            )
            .red()
        );
        println!("The next export will re-send every highlight to Readwise.");
        if !super::confirm("Reset the database?")? {
            println!("Aborted.");
            return Ok(());
        }
    }

    storage.reset()?;

    if json {
        let output = ResetOutput {
            highlights_removed: highlights,
            sessions_removed: sessions,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Database reset: removed {highlights} highlight(s) and {sessions} session(s).");
    }
    Ok(())
}

//! History command implementation.

use crate::config::resolve_db_path;
use crate::error::{Error, Result};
use crate::storage::{ExportSession, Highlight, SqliteStorage};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct HistoryOutput {
    sessions: Vec<ExportSession>,
    count: usize,
}

#[derive(Serialize)]
struct SessionDetailOutput {
    session: ExportSession,
    highlights: Vec<Highlight>,
}

/// Execute the history command.
///
/// # Errors
///
/// Returns an error when the database cannot be opened or the session
/// ID does not exist.
pub fn execute(
    limit: u32,
    session: Option<i64>,
    db_path: Option<&PathBuf>,
    json: bool,
) -> Result<()> {
    let db_path = resolve_db_path(db_path.cloned())?;
    let storage = SqliteStorage::open(&db_path)?;

    match session {
        Some(id) => show_session(&storage, id, json),
        None => list_sessions(&storage, limit, json),
    }
}

fn list_sessions(storage: &SqliteStorage, limit: u32, json: bool) -> Result<()> {
    let sessions = storage.get_sessions(limit)?;

    if json {
        let output = HistoryOutput {
            count: sessions.len(),
            sessions,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("No export sessions yet.");
        return Ok(());
    }

    println!(
        "{:<6} {:<22} {:<9} {:>6} {:>6} {:>6}  SOURCE",
        "ID", "STARTED", "STATUS", "TOTAL", "NEW", "DUPES"
    );
    for s in &sessions {
        println!(
            "{:<6} {:<22} {:<9} {:>6} {:>6} {:>6}  {}",
            s.id,
            &s.start_time[..s.start_time.len().min(19)],
            status_label(s),
            s.highlights_total,
            s.highlights_new,
            s.highlights_dupe,
            s.source_file
        );
    }
    Ok(())
}

fn show_session(storage: &SqliteStorage, id: i64, json: bool) -> Result<()> {
    let session = storage
        .get_session(id)?
        .ok_or(Error::SessionNotFound { id })?;

    // Rows written during the session carry export timestamps inside
    // its window. An unfinalized session has no window to show.
    let highlights = match &session.end_time {
        Some(end) => storage.get_highlights_between(&session.start_time, end)?,
        None => Vec::new(),
    };

    if json {
        let output = SessionDetailOutput {
            session,
            highlights,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("Session {}", session.id);
    println!("  Started:    {}", session.start_time);
    println!(
        "  Ended:      {}",
        session.end_time.as_deref().unwrap_or("-")
    );
    println!("  Source:     {}", session.source_file);
    println!("  Status:     {}", status_label(&session));
    println!(
        "  Highlights: {} total, {} new, {} duplicates",
        session.highlights_total, session.highlights_new, session.highlights_dupe
    );

    if !highlights.is_empty() {
        println!("  Written this session:");
        for h in &highlights {
            println!("    [{}] {} - {}", h.id, h.title, truncated(&h.text));
        }
    }
    Ok(())
}

fn status_label(session: &ExportSession) -> colored::ColoredString {
    use crate::model::SessionStatus;
    let s = session.status.as_str();
    match session.status {
        SessionStatus::Success => s.green(),
        SessionStatus::Partial => s.yellow(),
        SessionStatus::Error => s.red(),
        SessionStatus::Running => s.normal(),
    }
}

fn truncated(text: &str) -> String {
    const MAX: usize = 60;
    if text.chars().count() > MAX {
        let cut: String = text.chars().take(MAX).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

//! Highlights command implementations (browse and manage the store).

use crate::cli::{HighlightsCommands, ListArgs};
use crate::config::resolve_db_path;
use crate::error::{Error, Result};
use crate::storage::{
    BookSummary, Highlight, HighlightFilters, SortField, SortOrder, SqliteStorage,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct ListOutput {
    highlights: Vec<Highlight>,
    count: usize,
    total_matching: i64,
}

#[derive(Serialize)]
struct BooksOutput {
    books: Vec<BookSummary>,
    count: usize,
}

#[derive(Serialize)]
struct DeleteOutput {
    deleted: usize,
}

/// Execute highlights commands.
pub fn execute(command: &HighlightsCommands, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let db_path = resolve_db_path(db_path.cloned())?;

    match command {
        HighlightsCommands::List(args) => list(args, &db_path, json),
        HighlightsCommands::Books => books(&db_path, json),
        HighlightsCommands::Delete {
            id,
            book,
            author,
            force,
        } => delete(*id, book.as_deref(), author.as_deref(), *force, &db_path, json),
    }
}

fn list(args: &ListArgs, db_path: &Path, json: bool) -> Result<()> {
    let storage = SqliteStorage::open(db_path)?;

    let filters = HighlightFilters {
        title: args.title.clone(),
        author: args.author.clone(),
        text: args.text.clone(),
    };
    let sort = SortField::parse(&args.sort)?;
    let order = SortOrder::parse(&args.order)?;

    let highlights = storage.get_highlights(&filters, sort, order, args.limit, args.offset)?;
    let total_matching = storage.count_highlights(&filters)?;

    if json {
        let output = ListOutput {
            count: highlights.len(),
            total_matching,
            highlights,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if highlights.is_empty() {
        println!("No highlights match.");
        return Ok(());
    }

    for h in &highlights {
        let author = if h.author.is_empty() {
            String::new()
        } else {
            format!(" - {}", h.author)
        };
        let location = h
            .location
            .as_deref()
            .map(|l| format!(" ({l})"))
            .unwrap_or_default();
        println!("[{}] {}{}{}", h.id, h.title, author, location);
        println!("    {}", h.text.replace('\n', "\n    "));
    }
    println!(
        "Showing {} of {} matching highlight(s).",
        highlights.len(),
        total_matching
    );
    Ok(())
}

fn books(db_path: &Path, json: bool) -> Result<()> {
    let storage = SqliteStorage::open(db_path)?;
    let books = storage.list_books()?;

    if json {
        let output = BooksOutput {
            count: books.len(),
            books,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if books.is_empty() {
        println!("No highlights in the database.");
        return Ok(());
    }

    for b in &books {
        let author = if b.author.is_empty() {
            "(unknown author)".to_string()
        } else {
            b.author.clone()
        };
        println!("{:>5}  {} - {}", b.highlight_count, b.title, author);
    }
    Ok(())
}

fn delete(
    id: Option<i64>,
    book: Option<&str>,
    author: Option<&str>,
    force: bool,
    db_path: &Path,
    json: bool,
) -> Result<()> {
    let mut storage = SqliteStorage::open(db_path)?;

    let deleted = match (id, book) {
        (Some(id), None) => {
            if !force && !super::confirm(&format!("Delete highlight {id}?"))? {
                println!("Aborted.");
                return Ok(());
            }
            if !storage.delete_highlight(id)? {
                return Err(Error::HighlightNotFound { id });
            }
            1
        }
        (None, Some(book)) => {
            let label = match author {
                Some(a) => format!("'{book}' by {a}"),
                None => format!("'{book}'"),
            };
            if !force && !super::confirm(&format!("Delete all highlights of {label}?"))? {
                println!("Aborted.");
                return Ok(());
            }
            storage.delete_highlights_by_book(book, author)?
        }
        _ => {
            return Err(Error::InvalidArgument(
                "pass exactly one of --id or --book".to_string(),
            ));
        }
    };

    if json {
        println!("{}", serde_json::to_string(&DeleteOutput { deleted })?);
    } else {
        println!("Deleted {deleted} highlight(s).");
    }
    Ok(())
}

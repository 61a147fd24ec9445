//! Export command implementation.

use crate::cli::ExportArgs;
use crate::config::{resolve_db_path, resolve_token};
use crate::error::{Error, Result};
use crate::export::{read_clippings_file, ExportOptions, Exporter, ExportSummary};
use crate::readwise::{HighlightSender, ReadwiseClient};
use crate::storage::SqliteStorage;
use colored::Colorize;
use std::path::PathBuf;

/// Execute the export command.
///
/// # Errors
///
/// Returns an error when the clippings file is missing, the token is
/// absent or rejected, or the run aborts on a storage failure.
pub fn execute(args: &ExportArgs, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let db_path = resolve_db_path(db_path.cloned())?;
    let text = read_clippings_file(&args.file)?;
    let mut storage = SqliteStorage::open(&db_path)?;

    let options = ExportOptions {
        force: args.force,
        dry_run: args.dry_run,
        selected: None,
    };

    // A dry run never talks to Readwise, so no token is needed.
    let token = if args.dry_run {
        String::new()
    } else {
        resolve_token(args.token.clone())?
    };
    let client = ReadwiseClient::new(token);
    let source = args.file.display().to_string();

    let runtime = tokio::runtime::Runtime::new()?;
    let summary = runtime.block_on(async {
        if !args.dry_run && !client.validate_token().await? {
            return Err(Error::Authentication);
        }
        Exporter::new(&mut storage, &client)
            .run(&source, &text, &options)
            .await
    })?;

    if json {
        println!("{}", serde_json::to_string(&summary)?);
        return Ok(());
    }

    print_summary(&summary, args.dry_run);
    Ok(())
}

fn print_summary(summary: &ExportSummary, dry_run: bool) {
    if dry_run {
        println!("{}", "Dry run - nothing was sent or saved.".yellow());
        println!(
            "Found {} exportable highlight(s): {} new, {} already exported.",
            summary.total, summary.new, summary.duplicates
        );
    } else {
        println!(
            "Exported {} highlight(s): {} sent, {} failed, {} duplicate(s) skipped.",
            summary.total,
            summary.sent.to_string().green(),
            if summary.failed > 0 {
                summary.failed.to_string().red()
            } else {
                summary.failed.to_string().normal()
            },
            summary.duplicates
        );
        if let Some(id) = summary.session_id {
            println!("Session {} finished with status {}.", id, summary.status);
        }
    }

    if !summary.diagnostics.is_empty() {
        println!(
            "{}",
            format!(
                "Skipped {} unparsable block(s):",
                summary.diagnostics.len()
            )
            .yellow()
        );
        for d in &summary.diagnostics {
            println!("  block {} (line {}): {}", d.section, d.line, d.reason);
        }
    }
}

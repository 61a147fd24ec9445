//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// Export Kindle clippings to Readwise
#[derive(Parser, Debug)]
#[command(name = "k2r", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.kindle2readwise/highlights.db)
    #[arg(long, global = true, env = "K2R_DB")]
    pub db: Option<PathBuf>,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse a clippings file and send new highlights to Readwise
    Export(ExportArgs),

    /// Show past export sessions
    History {
        /// Maximum number of sessions to show
        #[arg(long, default_value = "10")]
        limit: u32,

        /// Show details for one session ID
        #[arg(long)]
        session: Option<i64>,
    },

    /// Browse and manage exported highlights
    Highlights {
        #[command(subcommand)]
        command: HighlightsCommands,
    },

    /// Delete all highlights and session history from the database
    ResetDb {
        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Print version information
    Version,

    /// Generate shell completions
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Path to the Kindle "My Clippings.txt" file
    pub file: PathBuf,

    /// Readwise API token
    #[arg(long, env = "READWISE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Re-send highlights that were already exported
    #[arg(long)]
    pub force: bool,

    /// Parse and report without sending or writing anything
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Subcommand, Debug)]
pub enum HighlightsCommands {
    /// List exported highlights
    List(ListArgs),

    /// List books with highlight counts
    Books,

    /// Delete highlights by ID or by book
    Delete {
        /// Highlight ID to delete
        #[arg(long, conflicts_with = "book")]
        id: Option<i64>,

        /// Delete every highlight of this book title
        #[arg(long)]
        book: Option<String>,

        /// Narrow --book deletion to this author
        #[arg(long, requires = "book")]
        author: Option<String>,

        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Filter by title substring (case-insensitive)
    #[arg(long)]
    pub title: Option<String>,

    /// Filter by author substring (case-insensitive)
    #[arg(long)]
    pub author: Option<String>,

    /// Filter by highlight text substring (case-insensitive)
    #[arg(long)]
    pub text: Option<String>,

    /// Sort field (date_exported, date_highlighted)
    #[arg(long, default_value = "date_exported")]
    pub sort: String,

    /// Sort order (asc, desc)
    #[arg(long, default_value = "desc")]
    pub order: String,

    /// Maximum rows to show
    #[arg(long, default_value = "20")]
    pub limit: u32,

    /// Rows to skip (pagination)
    #[arg(long, default_value = "0")]
    pub offset: u32,
}

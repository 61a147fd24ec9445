//! Version command implementation.

use crate::config::default_db_path;
use crate::error::Result;
use serde::Serialize;

#[derive(Serialize)]
struct VersionOutput<'a> {
    version: &'a str,
    build: &'a str,
    description: &'a str,
    default_db: Option<String>,
}

/// Execute the version command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    let description = env!("CARGO_PKG_DESCRIPTION");
    let build = if cfg!(debug_assertions) {
        "dev"
    } else {
        "release"
    };
    // best effort; a missing home directory is not worth failing over
    let default_db = default_db_path()
        .ok()
        .map(|p| p.display().to_string());

    if json {
        let output = VersionOutput {
            version,
            build,
            description,
            default_db,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("k2r {version} ({build})");
    println!("{description}");
    if let Some(db) = default_db {
        println!("Default database: {db}");
    }
    Ok(())
}

//! Command implementations.

pub mod completions;
pub mod export;
pub mod highlights;
pub mod history;
pub mod reset_db;
pub mod version;

use crate::error::Result;
use std::io::Write;

/// Ask the user a yes/no question on stdin. Anything but `y`/`yes`
/// (case-insensitive) is a no.
pub(crate) fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    let answer = answer.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}

//! Configuration resolution: database path and API token.
//!
//! Both follow flag > environment > default precedence. The
//! environment lookups themselves are wired through clap, so the
//! helpers here only handle defaults and validation.

use std::path::PathBuf;

use directories::BaseDirs;

use crate::error::{Error, Result};

/// Environment variable overriding the database path.
pub const DB_ENV: &str = "K2R_DB";

/// Environment variable supplying the Readwise API token.
pub const TOKEN_ENV: &str = "READWISE_TOKEN";

/// Default database location: `~/.kindle2readwise/highlights.db`.
///
/// # Errors
///
/// Returns [`Error::Config`] when no home directory can be determined.
pub fn default_db_path() -> Result<PathBuf> {
    let base = BaseDirs::new()
        .ok_or_else(|| Error::Config("could not determine home directory".to_string()))?;
    Ok(base
        .home_dir()
        .join(".kindle2readwise")
        .join("highlights.db"))
}

/// Resolve the database path from the `--db` flag (which already
/// absorbed `K2R_DB`), falling back to the default location.
///
/// # Errors
///
/// Returns an error when neither a flag value nor a home directory is
/// available.
pub fn resolve_db_path(flag: Option<PathBuf>) -> Result<PathBuf> {
    match flag {
        Some(path) => Ok(path),
        None => default_db_path(),
    }
}

/// Resolve the Readwise token from the `--token` flag (which already
/// absorbed `READWISE_TOKEN`).
///
/// # Errors
///
/// Returns [`Error::MissingToken`] when no token was provided or it is
/// blank.
pub fn resolve_token(flag: Option<String>) -> Result<String> {
    match flag {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(Error::MissingToken),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_db_path_wins() {
        let path = resolve_db_path(Some(PathBuf::from("/tmp/custom.db"))).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/custom.db"));
    }

    #[test]
    fn default_db_path_is_under_home() {
        let path = default_db_path().unwrap();
        assert!(path.ends_with(".kindle2readwise/highlights.db"));
    }

    #[test]
    fn token_must_be_non_blank() {
        assert_eq!(resolve_token(Some("abc123".to_string())).unwrap(), "abc123");
        assert_eq!(resolve_token(Some("  abc  ".to_string())).unwrap(), "abc");
        assert!(matches!(resolve_token(None), Err(Error::MissingToken)));
        assert!(matches!(
            resolve_token(Some("   ".to_string())),
            Err(Error::MissingToken)
        ));
    }
}

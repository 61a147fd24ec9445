//! Core data types shared across the parser, storage, and export pipeline.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Kind of a Kindle clipping.
///
/// Validated at construction: a metadata line naming anything else
/// fails the block with a parse diagnostic instead of producing an
/// untyped record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClippingKind {
    Highlight,
    Note,
    Bookmark,
}

impl ClippingKind {
    /// Parse the kind word from a metadata line (case-insensitive).
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "highlight" => Ok(Self::Highlight),
            "note" => Ok(Self::Note),
            "bookmark" => Ok(Self::Bookmark),
            other => Err(Error::InvalidArgument(format!(
                "unknown clipping kind: {other}"
            ))),
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::Highlight => "highlight",
            Self::Note => "note",
            Self::Bookmark => "bookmark",
        }
    }
}

impl std::fmt::Display for ClippingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parsed clipping from a "My Clippings.txt" file.
///
/// Transient: produced by the parser, consumed by fingerprinting and
/// the Readwise payload conversion. `author` is the empty string when
/// the title line carries no `(Author)` suffix, so downstream code
/// never deals with an absent author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClippingRecord {
    pub title: String,
    pub author: String,
    pub kind: ClippingKind,
    /// Page token as printed by the device (`"92"`, `"12-13"`).
    pub page: Option<String>,
    /// Location token as printed by the device (`"1406-1407"`, `"3156"`).
    pub location: Option<String>,
    /// When the clipping was made. `None` if the date string did not
    /// match any known device format.
    pub timestamp: Option<NaiveDateTime>,
    /// Clipping text with internal newlines preserved. Empty for
    /// bookmarks and tolerated as empty for the other kinds.
    pub content: String,
}

impl ClippingRecord {
    /// The location token preferred for display and export: page wins
    /// over location when both are present.
    #[must_use]
    pub fn display_location(&self) -> Option<&str> {
        self.page.as_deref().or(self.location.as_deref())
    }
}

/// Per-highlight export outcome stored in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStatus {
    Success,
    Error,
}

impl ExportStatus {
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            other => Err(Error::InvalidArgument(format!(
                "unknown export status: {other}"
            ))),
        }
    }
}

/// Lifecycle state of an export session.
///
/// `Running` is the only non-terminal state; a session never
/// transitions back once finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Success,
    Partial,
    Error,
}

impl SessionStatus {
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "running" => Ok(Self::Running),
            "success" => Ok(Self::Success),
            "partial" => Ok(Self::Partial),
            "error" => Ok(Self::Error),
            other => Err(Error::InvalidArgument(format!(
                "unknown session status: {other}"
            ))),
        }
    }

    /// Whether this status can still change.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

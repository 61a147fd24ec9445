//! Export pipeline: parse, deduplicate, send, record.
//!
//! Ties the parser, the fingerprint store, and the Readwise sender
//! together into one run with a session ledger entry. The pipeline is
//! generic over [`HighlightSender`] so it can be driven in tests by a
//! stub with no network.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{ClippingKind, ClippingRecord, ExportStatus, SessionStatus};
use crate::parser::{ClippingsParser, ParseDiagnostic};
use crate::readwise::{HighlightSender, ItemOutcome, ReadwisePayload};
use crate::storage::{fingerprint, NewHighlight, SessionStats, SqliteStorage};

/// Options controlling one export run.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Re-send highlights that were already exported.
    pub force: bool,
    /// Parse and report, but neither send nor write anything.
    pub dry_run: bool,
    /// When set, only records whose fingerprint is in this set are
    /// exported; everything else counts as filtered out.
    pub selected: Option<HashSet<String>>,
}

/// Result of one export run.
#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    /// Ledger id of the session; absent for dry runs.
    pub session_id: Option<i64>,
    /// Exportable records found in the file (bookmarks and empty
    /// clippings excluded).
    pub total: usize,
    /// Records not previously exported (everything, under `force`).
    pub new: usize,
    /// Records skipped because they were already exported.
    pub duplicates: usize,
    /// Records accepted by Readwise this run.
    pub sent: usize,
    /// Records Readwise did not accept this run.
    pub failed: usize,
    pub diagnostics: Vec<ParseDiagnostic>,
    pub status: SessionStatus,
}

/// One export run over a clippings file.
pub struct Exporter<'a, S: HighlightSender> {
    storage: &'a mut SqliteStorage,
    sender: &'a S,
}

impl<'a, S: HighlightSender> Exporter<'a, S> {
    pub fn new(storage: &'a mut SqliteStorage, sender: &'a S) -> Self {
        Self { storage, sender }
    }

    /// Run the pipeline over the raw text of a clippings file.
    ///
    /// `source_file` is recorded in the session ledger; the caller has
    /// already read the file. Send failures on individual highlights
    /// do not abort the run; they are counted and the session ends
    /// `partial` (or `error` when nothing got through).
    ///
    /// # Errors
    ///
    /// Returns an error for fatal conditions only: storage failures or
    /// rejected credentials. A credentials failure finalizes the
    /// session as `error` before propagating.
    pub async fn run(
        &mut self,
        source_file: &str,
        text: &str,
        options: &ExportOptions,
    ) -> Result<ExportSummary> {
        let (records, diagnostics) = ClippingsParser::new(text).parse_all();
        let candidates = self.select_candidates(records, options)?;

        let total = candidates.len();
        // force bypasses the duplicate filter, so everything is "new"
        let new = if options.force {
            total
        } else {
            candidates.iter().filter(|c| !c.duplicate).count()
        };
        let to_send: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| options.force || !c.duplicate)
            .collect();

        if options.dry_run {
            tracing::info!(total, new, would_send = to_send.len(), "dry run, not sending");
            return Ok(ExportSummary {
                session_id: None,
                total,
                new,
                duplicates: total - new,
                sent: 0,
                failed: 0,
                diagnostics,
                status: SessionStatus::Success,
            });
        }

        let session_id = self.storage.start_session(source_file)?;
        let stats = SessionStats {
            total: total as i64,
            new: new as i64,
            duplicates: (total - new) as i64,
        };

        if to_send.is_empty() {
            self.storage
                .finalize_session(session_id, &stats, SessionStatus::Success)?;
            return Ok(ExportSummary {
                session_id: Some(session_id),
                total,
                new,
                duplicates: total - new,
                sent: 0,
                failed: 0,
                diagnostics,
                status: SessionStatus::Success,
            });
        }

        let payloads: Vec<ReadwisePayload> = to_send
            .iter()
            .map(|c| ReadwisePayload::from_record(&c.record))
            .collect();

        let outcomes = match self.sender.send_highlights(&payloads).await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                self.storage
                    .finalize_session(session_id, &stats, SessionStatus::Error)?;
                return Err(e);
            }
        };
        debug_assert_eq!(outcomes.len(), to_send.len());

        let mut sent = 0usize;
        let mut failed = 0usize;
        for (candidate, outcome) in to_send.iter().zip(&outcomes) {
            let (status, readwise_id) = match outcome {
                ItemOutcome::Sent { readwise_id } => {
                    sent += 1;
                    (ExportStatus::Success, readwise_id.clone())
                }
                ItemOutcome::Failed { reason } => {
                    failed += 1;
                    tracing::warn!(
                        title = %candidate.record.title,
                        %reason,
                        "highlight not accepted"
                    );
                    (ExportStatus::Error, None)
                }
            };
            self.storage.upsert_highlight(
                &new_highlight(candidate, status, readwise_id),
                options.force,
            )?;
        }

        let status = if failed == 0 {
            SessionStatus::Success
        } else if sent > 0 {
            SessionStatus::Partial
        } else {
            SessionStatus::Error
        };
        self.storage.finalize_session(session_id, &stats, status)?;
        tracing::info!(session_id, total, new, sent, failed, %status, "export finished");

        Ok(ExportSummary {
            session_id: Some(session_id),
            total,
            new,
            duplicates: total - new,
            sent,
            failed,
            diagnostics,
            status,
        })
    }

    /// Filter parsed records down to exportable candidates, fingerprint
    /// them, and mark duplicates against the store. Repeats within the
    /// same file keep only their first occurrence.
    fn select_candidates(
        &self,
        records: Vec<ClippingRecord>,
        options: &ExportOptions,
    ) -> Result<Vec<Candidate>> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut candidates = Vec::new();

        for record in records {
            if record.kind == ClippingKind::Bookmark || record.content.is_empty() {
                continue;
            }
            let fp = fingerprint(&record.title, &record.author, &record.content);
            if let Some(selected) = &options.selected {
                if !selected.contains(&fp) {
                    continue;
                }
            }
            if !seen.insert(fp.clone()) {
                continue;
            }
            let duplicate = self.storage.highlight_exists(&fp)?;
            candidates.push(Candidate {
                record,
                fingerprint: fp,
                duplicate,
            });
        }
        Ok(candidates)
    }
}

struct Candidate {
    record: ClippingRecord,
    fingerprint: String,
    duplicate: bool,
}

fn new_highlight(
    candidate: &Candidate,
    status: ExportStatus,
    readwise_id: Option<String>,
) -> NewHighlight {
    let record = &candidate.record;
    NewHighlight {
        fingerprint: candidate.fingerprint.clone(),
        title: record.title.clone(),
        author: record.author.clone(),
        text: record.content.clone(),
        location: record.display_location().map(str::to_string),
        date_highlighted: record
            .timestamp
            .map(|t| t.format("%Y-%m-%dT%H:%M:%S").to_string()),
        readwise_id,
        status,
    }
}

/// Read a clippings file from disk, mapping a missing file to the
/// dedicated error.
///
/// # Errors
///
/// Returns [`Error::ClippingsFileNotFound`] when the path does not
/// exist, or an IO error when reading fails.
pub fn read_clippings_file(path: &std::path::Path) -> Result<String> {
    if !path.exists() {
        return Err(Error::ClippingsFileNotFound {
            path: path.to_path_buf(),
        });
    }
    Ok(std::fs::read_to_string(path)?)
}

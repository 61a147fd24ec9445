//! Parser for Kindle "My Clippings.txt" files.
//!
//! The file is a sequence of blocks separated by a line of ten `=`
//! characters. Each block carries a title line (with an optional
//! trailing `(Author)`), a metadata line, a blank line, and zero or
//! more content lines. The format is loose: date formats vary by
//! device locale, bookmarks have no content, and corrupted blocks do
//! appear in the wild. One bad block never aborts the file; it is
//! reported as a [`ParseDiagnostic`] and parsing continues.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::model::{ClippingKind, ClippingRecord};

/// Separator line between clippings (ten `=` characters).
const SEPARATOR: &str = "==========";

/// Maximum characters of raw block text kept in a diagnostic.
const SNIPPET_LEN: usize = 120;

/// Date formats observed across device firmwares and locales.
///
/// Unlisted formats leave the timestamp absent rather than guessing.
const DATE_FORMATS: &[&str] = &[
    // "Tuesday, April 15, 2025 11:18:50 PM"
    "%A, %B %d, %Y %I:%M:%S %p",
    // "Saturday, 26 March 2016 14:59:39"
    "%A, %d %B %Y %H:%M:%S",
    // ISO-like exports
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// Fallbacks for when the printed weekday disagrees with the date
/// (chrono rejects the pair). Same shapes as above, weekday dropped.
const WEEKDAY_FREE_FORMATS: &[&str] = &[
    "%B %d, %Y %I:%M:%S %p",
    "%d %B %Y %H:%M:%S",
];

/// Soft failure for one unparsable block.
///
/// Collected alongside successful records; never raised as an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseDiagnostic {
    /// 1-based index of the block in the file.
    pub section: usize,
    /// 1-based line number where the block starts.
    pub line: usize,
    pub reason: String,
    /// Truncated raw text of the offending block.
    pub snippet: String,
}

/// Result of parsing one block: a record or a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Record(ClippingRecord),
    Diagnostic(ParseDiagnostic),
}

/// Parser over the full text of a clippings file.
///
/// Holds only a borrowed slice, so iteration is restartable: calling
/// [`ClippingsParser::outcomes`] again replays the same sequence.
#[derive(Debug, Clone, Copy)]
pub struct ClippingsParser<'a> {
    text: &'a str,
}

impl<'a> ClippingsParser<'a> {
    /// Create a parser over raw file text. A leading UTF-8 BOM is
    /// stripped here so the first title line parses like any other.
    #[must_use]
    pub fn new(text: &'a str) -> Self {
        Self {
            text: text.strip_prefix('\u{feff}').unwrap_or(text),
        }
    }

    /// Lazy ordered sequence of parse outcomes, one per non-empty block.
    #[must_use]
    pub fn outcomes(&self) -> Outcomes<'a> {
        Outcomes {
            lines: self.text.lines(),
            line_no: 0,
            section: 0,
        }
    }

    /// Eagerly parse the whole file, separating records from diagnostics.
    #[must_use]
    pub fn parse_all(&self) -> (Vec<ClippingRecord>, Vec<ParseDiagnostic>) {
        let mut records = Vec::new();
        let mut diagnostics = Vec::new();
        for outcome in self.outcomes() {
            match outcome {
                ParseOutcome::Record(r) => records.push(r),
                ParseOutcome::Diagnostic(d) => {
                    tracing::warn!(
                        section = d.section,
                        line = d.line,
                        reason = %d.reason,
                        "skipping unparsable clipping block"
                    );
                    diagnostics.push(d);
                }
            }
        }
        tracing::info!(
            records = records.len(),
            diagnostics = diagnostics.len(),
            "parsing complete"
        );
        (records, diagnostics)
    }
}

/// Iterator over block parse outcomes. Blocks containing only
/// whitespace (e.g. between trailing separators) are skipped.
pub struct Outcomes<'a> {
    lines: std::str::Lines<'a>,
    line_no: usize,
    section: usize,
}

impl Iterator for Outcomes<'_> {
    type Item = ParseOutcome;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let mut block: Vec<&str> = Vec::new();
            let mut start_line = self.line_no + 1;
            let mut saw_line = false;

            for line in self.lines.by_ref() {
                self.line_no += 1;
                saw_line = true;
                if line.trim_end() == SEPARATOR {
                    break;
                }
                if block.is_empty() && line.trim().is_empty() {
                    // leading blank lines belong to no block
                    start_line = self.line_no + 1;
                    continue;
                }
                block.push(line);
            }

            if !saw_line {
                return None;
            }
            if block.iter().all(|l| l.trim().is_empty()) {
                continue;
            }

            self.section += 1;
            return Some(parse_block(&block, self.section, start_line));
        }
    }
}

/// Parse one block into a record, or explain why it cannot be.
fn parse_block(lines: &[&str], section: usize, start_line: usize) -> ParseOutcome {
    let diagnostic = |reason: String| {
        ParseOutcome::Diagnostic(ParseDiagnostic {
            section,
            line: start_line,
            reason,
            snippet: snippet(lines),
        })
    };

    if lines.len() < 2 {
        return diagnostic(format!("block has {} line(s), need at least 2", lines.len()));
    }

    let (title, author) = parse_title_author(lines[0].trim());

    let metadata = lines[1].trim();
    let (kind, page, location, date_str) = match parse_metadata(metadata) {
        Ok(parts) => parts,
        Err(reason) => return diagnostic(reason),
    };

    let timestamp = parse_date(date_str);
    if timestamp.is_none() {
        tracing::debug!(section, date = date_str, "unrecognized date format, storing absent");
    }

    // Everything after the metadata line is content; the conventional
    // blank line and surrounding whitespace are trimmed away while
    // internal newlines stay intact.
    let content = lines
        .get(2..)
        .map(|rest| rest.join("\n").trim().to_string())
        .unwrap_or_default();

    ParseOutcome::Record(ClippingRecord {
        title,
        author,
        kind,
        page,
        location,
        timestamp,
        content,
    })
}

/// Split a title line into title and author.
///
/// The author is the last parenthesized group at the end of the line:
/// `"Deep Work (Cal Newport)"` → `("Deep Work", "Cal Newport")`. A
/// line without that shape is all title, author empty.
fn parse_title_author(line: &str) -> (String, String) {
    if line.ends_with(')') {
        if let Some(open) = line.rfind(" (") {
            let author = &line[open + 2..line.len() - 1];
            if !author.is_empty() && !author.contains(')') {
                return (line[..open].trim().to_string(), author.trim().to_string());
            }
        }
    }
    (line.to_string(), String::new())
}

/// Parse the metadata line into (kind, page, location, date string).
///
/// Handles the observed variants uniformly:
/// - `- Your Highlight on page 92 | Location 1406-1407 | Added on ...`
/// - `- Your Highlight on Location 3156-3159 | Added on ...`
/// - `- Your Note at location 100 | Added on ...`
/// - `- Your Bookmark on page 4 | Added on ...`
fn parse_metadata(line: &str) -> std::result::Result<(ClippingKind, Option<String>, Option<String>, &str), String> {
    let rest = line
        .strip_prefix("- Your ")
        .ok_or_else(|| format!("metadata line does not start with '- Your ': {line:?}"))?;

    let kind_word = rest.split_whitespace().next().unwrap_or_default();
    let kind = ClippingKind::parse(kind_word)
        .map_err(|_| format!("unknown clipping kind {kind_word:?}"))?;

    let (head, date_str) = rest
        .split_once("Added on ")
        .ok_or_else(|| format!("metadata line has no 'Added on' date: {line:?}"))?;

    let page = token_after(head, "page ");
    let location = token_after(head, "location ");

    Ok((kind, page, location, date_str.trim()))
}

/// Find the numeric range token following `keyword` (case-insensitive),
/// e.g. `"92"` or `"1406-1407"`. Returns `None` when the keyword is
/// absent or not followed by digits.
fn token_after(haystack: &str, keyword: &str) -> Option<String> {
    let lower = haystack.to_ascii_lowercase();
    let pos = lower.find(keyword)?;
    let tail = &haystack[pos + keyword.len()..];
    let token: String = tail
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    (!token.is_empty() && token.chars().any(|c| c.is_ascii_digit())).then_some(token)
}

/// Try each known date format; absent beats a wrong guess.
///
/// A device with a skewed clock can print a weekday that does not
/// match the date. The date and time are still trustworthy, so the
/// weekday is dropped and the rest parsed before giving up.
fn parse_date(date_str: &str) -> Option<NaiveDateTime> {
    if let Some(ts) = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(date_str, fmt).ok())
    {
        return Some(ts);
    }

    let (_, tail) = date_str.split_once(", ")?;
    WEEKDAY_FREE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(tail, fmt).ok())
}

fn snippet(lines: &[&str]) -> String {
    let raw = lines.join("\n");
    if raw.len() > SNIPPET_LEN {
        let mut end = SNIPPET_LEN;
        while !raw.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &raw[..end])
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    fn records(text: &str) -> (Vec<ClippingRecord>, Vec<ParseDiagnostic>) {
        ClippingsParser::new(text).parse_all()
    }

    const SAMPLE: &str = "Book A (Author X)\n\
- Your Highlight on Location 10-11 | Added on Sunday, January 1, 2023 1:00:00 AM\n\
\n\
Sample text\n\
==========\n";

    #[test]
    fn parses_single_well_formed_entry() {
        let (recs, diags) = records(SAMPLE);
        assert!(diags.is_empty());
        assert_eq!(recs.len(), 1);
        let r = &recs[0];
        assert_eq!(r.title, "Book A");
        assert_eq!(r.author, "Author X");
        assert_eq!(r.kind, ClippingKind::Highlight);
        assert_eq!(r.location.as_deref(), Some("10-11"));
        assert_eq!(r.page, None);
        assert_eq!(r.content, "Sample text");
        let ts = r.timestamp.unwrap();
        assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert_eq!(ts.hour(), 1);
    }

    #[test]
    fn n_entries_parse_in_file_order() {
        let mut text = String::new();
        for i in 0..5 {
            text.push_str(&format!(
                "Book {i} (Someone)\n\
                 - Your Highlight on Location {i}0-{i}5 | Added on Sunday, January 1, 2023 1:00:00 AM\n\
                 \n\
                 content {i}\n\
                 ==========\n"
            ));
        }
        let (recs, diags) = records(&text);
        assert!(diags.is_empty());
        assert_eq!(recs.len(), 5);
        for (i, r) in recs.iter().enumerate() {
            assert_eq!(r.title, format!("Book {i}"));
            assert_eq!(r.content, format!("content {i}"));
        }
    }

    #[test]
    fn missing_author_yields_empty_string() {
        let text = "Standalone Title\n\
                    - Your Highlight on Location 5 | Added on Sunday, January 1, 2023 1:00:00 AM\n\
                    \n\
                    text\n\
                    ==========\n";
        let (recs, _) = records(text);
        assert_eq!(recs[0].title, "Standalone Title");
        assert_eq!(recs[0].author, "");
    }

    #[test]
    fn bookmark_is_emitted_with_empty_content() {
        let text = "Some Book (A. Writer)\n\
                    - Your Bookmark on page 45 | Added on Sunday, January 1, 2023 1:00:00 AM\n\
                    \n\
                    ==========\n";
        let (recs, diags) = records(text);
        assert!(diags.is_empty());
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].kind, ClippingKind::Bookmark);
        assert_eq!(recs[0].content, "");
        assert_eq!(recs[0].page.as_deref(), Some("45"));
    }

    #[test]
    fn multiline_content_preserves_internal_newlines() {
        let text = "Book (X)\n\
                    - Your Highlight on Location 1-2 | Added on Sunday, January 1, 2023 1:00:00 AM\n\
                    \n\
                    first line\n\
                    second line\n\
                    ==========\n";
        let (recs, _) = records(text);
        assert_eq!(recs[0].content, "first line\nsecond line");
    }

    #[test]
    fn corrupted_block_between_valid_blocks_yields_diagnostic() {
        let text = "Book A (X)\n\
                    - Your Highlight on Location 1 | Added on Sunday, January 1, 2023 1:00:00 AM\n\
                    \n\
                    alpha\n\
                    ==========\n\
                    total garbage here\n\
                    no metadata at all\n\
                    ==========\n\
                    Book B (Y)\n\
                    - Your Highlight on Location 2 | Added on Sunday, January 1, 2023 1:00:00 AM\n\
                    \n\
                    beta\n\
                    ==========\n";
        let (recs, diags) = records(text);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].content, "alpha");
        assert_eq!(recs[1].content, "beta");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].section, 2);
        assert!(diags[0].snippet.contains("total garbage"));
    }

    #[test]
    fn page_and_location_both_captured() {
        let text = "Mixed (Z)\n\
                    - Your Highlight on page 92 | Location 1406-1407 | Added on Tuesday, April 15, 2025 11:18:50 PM\n\
                    \n\
                    body\n\
                    ==========\n";
        let (recs, _) = records(text);
        assert_eq!(recs[0].page.as_deref(), Some("92"));
        assert_eq!(recs[0].location.as_deref(), Some("1406-1407"));
        assert_eq!(recs[0].display_location(), Some("92"));
    }

    #[test]
    fn european_date_format_is_accepted() {
        let text = "Book (X)\n\
                    - Your Highlight on Location 9 | Added on Saturday, 26 March 2016 14:59:39\n\
                    \n\
                    t\n\
                    ==========\n";
        let (recs, _) = records(text);
        let ts = recs[0].timestamp.unwrap();
        assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2016, 3, 26).unwrap());
    }

    #[test]
    fn skewed_weekday_does_not_drop_the_timestamp() {
        // Jan 1, 2023 was a Sunday; the device printed Monday anyway.
        let ts = parse_date("Monday, January 1, 2023 1:00:00 AM").unwrap();
        assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert_eq!(ts.hour(), 1);

        let ts = parse_date("Sunday, 26 March 2016 14:59:39").unwrap();
        assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2016, 3, 26).unwrap());

        assert!(parse_date("Monday, Nonsense 99, 2023 1:00:00 AM").is_none());
    }

    #[test]
    fn unparseable_date_becomes_absent_not_fatal() {
        let text = "Book (X)\n\
                    - Your Highlight on Location 9 | Added on sometime last week\n\
                    \n\
                    t\n\
                    ==========\n";
        let (recs, diags) = records(text);
        assert!(diags.is_empty());
        assert_eq!(recs[0].timestamp, None);
        assert_eq!(recs[0].content, "t");
    }

    #[test]
    fn leading_bom_is_stripped() {
        let text = format!("\u{feff}{SAMPLE}");
        let (recs, _) = records(&text);
        assert_eq!(recs[0].title, "Book A");
    }

    #[test]
    fn separator_tolerates_trailing_whitespace_and_cr() {
        let text = "Book A (X)\n\
                    - Your Highlight on Location 1 | Added on Sunday, January 1, 2023 1:00:00 AM\n\
                    \n\
                    a\n\
                    ==========\r\n\
                    Book B (Y)\n\
                    - Your Highlight on Location 2 | Added on Sunday, January 1, 2023 1:00:00 AM\n\
                    \n\
                    b\n\
                    ==========  \n";
        let (recs, diags) = records(text);
        assert!(diags.is_empty());
        assert_eq!(recs.len(), 2);
    }

    #[test]
    fn notes_stay_independent_records() {
        let text = "Book (X)\n\
                    - Your Highlight on page 10 | Added on Sunday, January 1, 2023 1:00:00 AM\n\
                    \n\
                    highlighted text\n\
                    ==========\n\
                    Book (X)\n\
                    - Your Note on page 10 | Added on Sunday, January 1, 2023 1:01:00 AM\n\
                    \n\
                    my annotation\n\
                    ==========\n";
        let (recs, _) = records(text);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].kind, ClippingKind::Highlight);
        assert_eq!(recs[1].kind, ClippingKind::Note);
        assert_eq!(recs[1].content, "my annotation");
    }

    #[test]
    fn iteration_is_restartable() {
        let parser = ClippingsParser::new(SAMPLE);
        let first: Vec<_> = parser.outcomes().collect();
        let second: Vec<_> = parser.outcomes().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn author_with_nested_parens_takes_last_group() {
        let (title, author) = parse_title_author("History (Vol. 2) (Jane Doe)");
        assert_eq!(title, "History (Vol. 2)");
        assert_eq!(author, "Jane Doe");
    }

    #[test]
    fn unknown_kind_is_a_diagnostic() {
        let text = "Book (X)\n\
                    - Your Scribble on Location 9 | Added on Sunday, January 1, 2023 1:00:00 AM\n\
                    \n\
                    t\n\
                    ==========\n";
        let (recs, diags) = records(text);
        assert!(recs.is_empty());
        assert_eq!(diags.len(), 1);
        assert!(diags[0].reason.contains("Scribble"));
    }
}

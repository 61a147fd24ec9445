//! Content fingerprinting for highlight deduplication.
//!
//! A fingerprint is the SHA-256 of the normalized title, author, and
//! text joined with `|`. Normalization trims, lowercases, and collapses
//! whitespace runs, so re-exports of the same highlight with trivial
//! formatting differences map to the same key.

use sha2::{Digest, Sha256};

/// Compute the deduplication fingerprint for a highlight.
///
/// Deterministic: identical logical highlights always produce the same
/// 64-hex-char key regardless of surrounding whitespace or casing.
#[must_use]
pub fn fingerprint(title: &str, author: &str, text: &str) -> String {
    let joined = format!(
        "{}|{}|{}",
        normalize(title),
        normalize(author),
        normalize(text)
    );
    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Lowercase and collapse all whitespace runs to single spaces.
fn normalize(s: &str) -> String {
    s.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic() {
        let a = fingerprint("Deep Work", "Cal Newport", "some highlight text");
        let b = fingerprint("Deep Work", "Cal Newport", "some highlight text");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn fingerprint_ignores_case_and_whitespace() {
        let a = fingerprint("Deep Work", "Cal Newport", "some  highlight\ntext");
        let b = fingerprint("  deep work ", "CAL NEWPORT", "Some Highlight Text");
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_distinguishes_content() {
        let a = fingerprint("Deep Work", "Cal Newport", "text one");
        let b = fingerprint("Deep Work", "Cal Newport", "text two");
        assert_ne!(a, b);
    }

    #[test]
    fn empty_author_is_part_of_the_key() {
        let a = fingerprint("Title", "", "text");
        let b = fingerprint("Title", "Someone", "text");
        assert_ne!(a, b);
    }
}

//! Small text helpers shared by stages and adapters.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

static NON_WORD: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}]+").ok());

static CODE_FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```[a-zA-Z]*\s*\n(.*?)\n?\s*```").ok());

/// Builds a URL slug: lowercase, runs of non-alphanumerics replaced by `-`.
///
/// Letters outside ASCII are kept, so Japanese titles produce readable slugs.
///
/// ```
/// use postflow::utils::slugify;
///
/// assert_eq!(slugify("Summer Pickup: Safety 101!"), "summer-pickup-safety-101");
/// ```
#[must_use]
pub fn slugify(text: &str) -> String {
    let lower = text.to_lowercase();
    match NON_WORD.as_ref() {
        Some(re) => re.replace_all(&lower, "-").trim_matches('-').to_string(),
        None => lower.split_whitespace().collect::<Vec<_>>().join("-"),
    }
}

/// Returns the hex SHA-256 of an article's title and body.
///
/// Used as an idempotency fingerprint: an upsert whose fingerprint matches
/// the stored one changes nothing.
#[must_use]
pub fn content_hash(title: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update([0u8]);
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}

/// Returns the contents of the first fenced code block, or the trimmed text
/// when there is none.
#[must_use]
pub fn strip_code_fence(text: &str) -> &str {
    CODE_FENCE
        .as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|c| c.get(1))
        .map_or_else(|| text.trim(), |m| m.as_str().trim())
}

/// Truncates to at most `max` characters on a char boundary.
#[must_use]
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

use regex::Regex;
use std::sync::LazyLock;

/// Marker packed between sentences of one translation request
pub const SENTINEL: &str = " z~~~z ";

// Translation engines may change case or spacing around the marker
static SENTINEL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*z\s*~~~\s*z\s*").expect("sentinel pattern is valid"));

/// Pack sentence texts into one request body
pub fn join_batch<S: AsRef<str>>(texts: &[S]) -> String {
    texts
        .iter()
        .map(|text| text.as_ref())
        .collect::<Vec<_>>()
        .join(SENTINEL)
}

/// Split a translated batch back into per-sentence texts.
///
/// A trailing empty piece left by a trailing marker is dropped.
pub fn split_batch(translated: &str) -> Vec<String> {
    let mut pieces: Vec<String> = SENTINEL_PATTERN
        .split(translated)
        .map(|piece| piece.trim().to_string())
        .collect();

    if pieces.last().is_some_and(|piece| piece.is_empty()) {
        pieces.pop();
    }

    pieces
}

// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text normalization shared by the classifier, template registry, and cache.

use sha2::{Digest, Sha256};

/// Filler words removed before template matching and fingerprinting.
pub const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "so", "just", "please", "um", "uh", "oh", "well",
    "is", "are", "was", "were", "be", "to", "of", "in", "on", "at", "for", "with", "it", "this",
    "that", "my", "me", "i", "you", "your", "do", "does", "can", "could", "would", "there",
];

/// Separator between the query and the context slice in cache keys.
const KEY_SEPARATOR: char = '\u{1f}';

/// Maximum number of content tokens in a pattern signature.
const SIGNATURE_TOKENS: usize = 5;

/// Lowercase, drop punctuation (apostrophes are removed, not split on),
/// and collapse whitespace.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars() {
        if c == '\'' || c == '\u{2019}' {
            continue;
        }
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(c.to_lowercase());
        } else {
            pending_space = true;
        }
    }
    out
}

/// Normalized text with stopwords removed.
pub fn strip_stopwords(normalized: &str) -> String {
    normalized
        .split_whitespace()
        .filter(|w| !STOPWORDS.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Topic fingerprint: the longest distinct content words (at least three
/// characters), sorted alphabetically. `None` when the text has no content
/// words.
pub fn signature(normalized: &str) -> Option<String> {
    let mut words: Vec<&str> = normalized
        .split_whitespace()
        .filter(|w| w.chars().count() >= 3 && !STOPWORDS.contains(w))
        .collect();
    words.sort_unstable();
    words.dedup();
    if words.is_empty() {
        return None;
    }
    // Longest words carry the most topic signal; stable sort keeps ties alphabetical.
    words.sort_by_key(|w| std::cmp::Reverse(w.chars().count()));
    words.truncate(SIGNATURE_TOKENS);
    words.sort_unstable();
    Some(words.join(" "))
}

/// Exact cache key: SHA-256 of the normalized query plus the last
/// `context_turns` normalized turns.
pub fn cache_key(normalized: &str, turns: &[String], context_turns: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    let skip = turns.len().saturating_sub(context_turns);
    for turn in turns.iter().skip(skip) {
        let mut buf = [0u8; 4];
        hasher.update(KEY_SEPARATOR.encode_utf8(&mut buf).as_bytes());
        hasher.update(normalize(turn).as_bytes());
    }
    hex::encode(hasher.finalize())
}

//! Delimiter-based tokenization and exact-token counting.
//!
//! Text is split on a fixed delimiter set and empty pieces are dropped. A
//! token matches only on exact equality: no case folding, no trimming.
//!
//! ```rust
//! use wordscout::tokenizer::{count_matches, tokenize};
//!
//! assert_eq!(tokenize("the cat, sat."), vec!["the", "cat", "sat"]);
//! assert_eq!(count_matches("Cat cat cat's", "cat"), 2);
//! ```

/// Characters that separate tokens
pub const DELIMITERS: [char; 12] = [
    '.', '?', '!', ' ', ';', ':', ',', '\n', '\r', '\t', '"', '\'',
];

/// Returns true if `c` separates tokens
#[inline]
pub fn is_delimiter(c: char) -> bool {
    DELIMITERS.contains(&c)
}

// Every delimiter is ASCII, so a byte-level check never lands inside a
// multi-byte character.
#[inline]
fn is_delimiter_byte(b: u8) -> bool {
    b.is_ascii() && is_delimiter(b as char)
}

/// Lazily yields the non-empty tokens of `text` in order
pub fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(is_delimiter).filter(|t| !t.is_empty())
}

/// Splits `text` into its non-empty tokens
pub fn tokenize(text: &str) -> Vec<&str> {
    tokens(text).collect()
}

/// Counts tokens of `text` exactly equal to `token`
pub fn count_matches(text: &str, token: &str) -> usize {
    tokens(text).filter(|t| *t == token).count()
}

/// Splits `text` into consecutive slices of roughly `target_len` bytes.
///
/// Each slice except the last ends immediately before a delimiter, so no
/// token straddles two slices and per-slice counts can simply be summed.
pub fn chunk_on_delimiters(text: &str, target_len: usize) -> Vec<&str> {
    let bytes = text.as_bytes();
    let target_len = target_len.max(1);
    let mut chunks = Vec::with_capacity(bytes.len() / target_len + 1);
    let mut start = 0;

    while start < bytes.len() {
        let mut end = (start + target_len).min(bytes.len());
        while end < bytes.len() && !is_delimiter_byte(bytes[end]) {
            end += 1;
        }
        chunks.push(&text[start..end]);
        start = end;
    }

    chunks
}

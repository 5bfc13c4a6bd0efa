//! URL-safe slugs for postal codes.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Fold `input` to lowercase ASCII and join its alphanumeric runs with `-`.
///
/// Characters are decomposed (NFKD) first, so accented Latin letters keep
/// their base letter. Anything without an ASCII form is dropped.
///
/// # Examples
///
/// ```rust
/// use geosync_core::slugify;
///
/// assert_eq!(slugify("SW1A 1AA"), "sw1a-1aa");
/// assert_eq!(slugify(" 01-234 "), "01-234");
/// assert_eq!(slugify("Zürich 8001"), "zurich-8001");
/// ```
#[must_use]
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_separator = false;
    for ch in input.nfkd() {
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(ch.to_ascii_lowercase());
        } else if !is_combining_mark(ch) {
            // Marks split off by decomposition belong to the preceding letter.
            pending_separator = true;
        }
    }
    slug
}

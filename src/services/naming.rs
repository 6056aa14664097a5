//! Event-name matching.
//!
//! Event names are typed by people through forms, so lookups and the
//! per-school uniqueness rule compare names the way a Russian-locale
//! secondary-strength collation does: letter case is ignored, base letters
//! and their accents are not. "Урок", "урок" and "УРОК" are one name;
//! "Ёлка" and "Елка" are two. Strings are brought to NFC first so a
//! precomposed "й" and "и" + combining breve compare equal.

use unicode_normalization::UnicodeNormalization;

/// Display form stored on the record: trimmed, NFC.
pub fn display_name(input: &str) -> String {
    input.trim().nfc().collect()
}

/// Comparison key: trimmed, NFC, Unicode lowercase.
pub fn collation_key(input: &str) -> String {
    display_name(input).to_lowercase()
}

//! Input sanitization
//!
//! Raw payloads arrive from heterogeneous clients; before any parsing they
//! are reduced to the character repertoire the clearing system accepts.

/// Byte-order mark
const BOM: char = '\u{FEFF}';

/// Whether a code point survives sanitization
///
/// Tab, LF, CR, printable ASCII, NEL and the Latin-1 supplement.
pub fn is_allowed(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\r' | '\u{20}'..='\u{7E}' | '\u{85}' | '\u{A0}'..='\u{FF}'
    )
}

/// Sanitize decoded text
///
/// Drops NUL code points, a leading byte-order mark and anything outside the
/// allow-list. Never fails.
pub fn sanitize(input: &str) -> String {
    let without_nul = input.chars().filter(|&c| c != '\0');
    let mut chars = without_nul.peekable();
    if chars.peek() == Some(&BOM) {
        chars.next();
    }
    chars.filter(|&c| is_allowed(c)).collect()
}

/// Sanitize raw bytes, decoding them as UTF-8
///
/// Invalid sequences decode to U+FFFD, which the allow-list then drops.
pub fn sanitize_bytes(input: &[u8]) -> String {
    sanitize(&String::from_utf8_lossy(input))
}

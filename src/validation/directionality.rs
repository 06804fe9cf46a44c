/*!
 * Bidirectional control marks.
 *
 * Widget labels in right-to-left documents often rely on explicit direction
 * marks to render punctuation and numbers correctly. Models like to drop
 * these invisible characters, so atomic units must keep every mark their
 * source had.
 */

/// LRM, RLM, ALM, the embedding/override controls and the isolates
pub const BIDI_MARKS: &[char] = &[
    '\u{200E}', '\u{200F}', '\u{061C}', '\u{202A}', '\u{202B}', '\u{202C}', '\u{202D}',
    '\u{202E}', '\u{2066}', '\u{2067}', '\u{2068}', '\u{2069}',
];

/// Whether a text contains any direction mark
pub fn has_bidi_marks(text: &str) -> bool {
    text.chars().any(|c| BIDI_MARKS.contains(&c))
}

/// First direction mark that occurs less often in the translation than in the source
pub fn missing_mark(source: &str, translated: &str) -> Option<char> {
    BIDI_MARKS.iter().copied().find(|mark| {
        let expected = source.chars().filter(|c| c == mark).count();
        expected > 0 && translated.chars().filter(|c| c == mark).count() < expected
    })
}

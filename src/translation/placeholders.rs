/*!
 * Placeholder tags for inline markup.
 *
 * Inline tags inside a translatable run are replaced by attribute-free
 * stand-ins before the text is sent out: `<a href="...">` becomes `<a>`,
 * `</a>` stays `</a>`, `<br/>` becomes `<br>`, and an inline element that must
 * not be translated at all is collapsed into a single opaque `<name/>`. The
 * table remembers the exact source bytes behind every stand-in, in order, so
 * the k-th `<a>` of a translation decodes back to the k-th `<a ...>` of the
 * source.
 */

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::document::parser::VOID_ELEMENTS;

/// Any tag-shaped token: `<` or `</` followed by a letter, up to the next `>`
pub static TAG_LIKE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?[A-Za-z][^<>]*>").expect("Invalid tag-like regex"));

/// A well-formed placeholder: `<name>`, `</name>` or `<name/>`
static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^<(/?)([a-z][a-z0-9-]*)(/?)>$").expect("Invalid placeholder regex")
});

/// Kind of markup a placeholder stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceholderKind {
    /// Open tag of an inline element with content
    Open,
    /// Close tag of an inline element
    Close,
    /// Void element such as `<br>` or `<img>`
    Void,
    /// Whole element kept verbatim
    Opaque,
}

/// One stand-in and the source bytes behind it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// Stand-in text as sent for translation
    pub token: String,
    /// Element name
    pub name: String,
    /// Kind of stand-in
    pub kind: PlaceholderKind,
    /// Exact source markup
    pub raw: String,
}

/// Build the stand-in text for an element name and kind
pub fn token_for(kind: PlaceholderKind, name: &str) -> String {
    match kind {
        PlaceholderKind::Open | PlaceholderKind::Void => format!("<{}>", name),
        PlaceholderKind::Close => format!("</{}>", name),
        PlaceholderKind::Opaque => format!("<{}/>", name),
    }
}

/// Classify a tag-shaped token; `None` when it is not a valid placeholder
pub fn classify(token: &str) -> Option<(PlaceholderKind, &str)> {
    let caps = PLACEHOLDER_RE.captures(token)?;
    let closing = !caps.get(1)?.as_str().is_empty();
    let name = caps.get(2)?.as_str();
    let self_closing = !caps.get(3)?.as_str().is_empty();
    let kind = match (closing, self_closing) {
        (true, false) => PlaceholderKind::Close,
        (false, true) => PlaceholderKind::Opaque,
        (false, false) if VOID_ELEMENTS.contains(&name) => PlaceholderKind::Void,
        (false, false) => PlaceholderKind::Open,
        (true, true) => return None,
    };
    Some((kind, name))
}

/// Tag-shaped tokens of a text, with byte ranges
pub fn scan_tokens(text: &str) -> Vec<(usize, usize, &str)> {
    TAG_LIKE_RE
        .find_iter(text)
        .map(|m| (m.start(), m.end(), m.as_str()))
        .collect()
}

/// Text with every tag-shaped token removed
pub fn strip_tokens(text: &str) -> String {
    TAG_LIKE_RE.replace_all(text, "").into_owned()
}

/// Whether open and close stand-ins in `text` nest properly
pub fn is_well_nested(text: &str) -> bool {
    let mut stack: Vec<&str> = Vec::new();
    for (_, _, token) in scan_tokens(text) {
        match classify(token) {
            Some((PlaceholderKind::Open, name)) => stack.push(name),
            Some((PlaceholderKind::Close, name)) => {
                if stack.pop() != Some(name) {
                    return false;
                }
            }
            _ => {}
        }
    }
    stack.is_empty()
}

/// Ordered stand-ins of one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceholderTable {
    entries: Vec<Placeholder>,
}

impl PlaceholderTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stand-in and return its token
    pub fn push(&mut self, kind: PlaceholderKind, name: &str, raw: &str) -> String {
        let token = token_for(kind, name);
        self.entries.push(Placeholder {
            token: token.clone(),
            name: name.to_string(),
            kind,
            raw: raw.to_string(),
        });
        token
    }

    /// All entries in source order
    pub fn entries(&self) -> &[Placeholder] {
        &self.entries
    }

    /// Whether the run had no inline markup
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace stand-ins with their source markup.
    ///
    /// The k-th occurrence of a token maps to the k-th source entry with that
    /// token. Tokens without a counterpart are left untouched.
    pub fn decode(&self, text: &str) -> String {
        if self.entries.is_empty() {
            return text.to_string();
        }

        let mut by_token: HashMap<&str, Vec<&str>> = HashMap::new();
        for entry in &self.entries {
            by_token.entry(entry.token.as_str()).or_default().push(entry.raw.as_str());
        }
        let mut seen: HashMap<&str, usize> = HashMap::new();

        TAG_LIKE_RE
            .replace_all(text, |caps: &regex::Captures<'_>| {
                let token = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
                let Some((key, raws)) = by_token.get_key_value(token) else {
                    return token.to_string();
                };
                let k = seen.entry(*key).or_insert(0);
                let replacement = raws.get(*k).map(|r| r.to_string());
                *k += 1;
                replacement.unwrap_or_else(|| token.to_string())
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_shouldRecognizeAllKinds() {
        assert_eq!(classify("<b>"), Some((PlaceholderKind::Open, "b")));
        assert_eq!(classify("</b>"), Some((PlaceholderKind::Close, "b")));
        assert_eq!(classify("<br>"), Some((PlaceholderKind::Void, "br")));
        assert_eq!(classify("<code/>"), Some((PlaceholderKind::Opaque, "code")));
        assert_eq!(classify("<b class=\"x\">"), None);
        assert_eq!(classify("</b/>"), None);
    }

    #[test]
    fn test_decode_shouldRestoreRawTagsInOrder() {
        let mut table = PlaceholderTable::new();
        let a1 = table.push(PlaceholderKind::Open, "a", "<a href=\"/one\">");
        let c1 = table.push(PlaceholderKind::Close, "a", "</a>");
        let a2 = table.push(PlaceholderKind::Open, "a", "<a href=\"/two\">");
        let c2 = table.push(PlaceholderKind::Close, "a", "</a>");
        let br = table.push(PlaceholderKind::Void, "br", "<br/>");

        let encoded = format!("{}un{} {}deux{}{}", a1, c1, a2, c2, br);
        assert_eq!(encoded, "<a>un</a> <a>deux</a><br>");
        assert_eq!(
            table.decode(&encoded),
            "<a href=\"/one\">un</a> <a href=\"/two\">deux</a><br/>"
        );
    }

    #[test]
    fn test_decode_shouldLeaveUnknownTokensAlone() {
        let mut table = PlaceholderTable::new();
        table.push(PlaceholderKind::Open, "i", "<i class=\"x\">");
        assert_eq!(table.decode("<i><i>"), "<i class=\"x\"><i>");
        assert_eq!(table.decode("<u>"), "<u>");
    }

    #[test]
    fn test_isWellNested_shouldDetectCrossedTags() {
        assert!(is_well_nested("<b>a <i>b</i></b><br>"));
        assert!(!is_well_nested("<b>a <i>b</b></i>"));
        assert!(!is_well_nested("<b>a"));
    }

    #[test]
    fn test_stripTokens_shouldRemoveTagsOnly() {
        assert_eq!(strip_tokens("Hello, <b>world</b>. 3 < 4"), "Hello, world. 3 < 4");
    }
}

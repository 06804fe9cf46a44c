/*!
 * Placeholder validation for translated units.
 *
 * The translation must carry exactly the placeholder tags of its source:
 * no unknown or attribute-bearing tags, the same count of each tag, and
 * proper nesting. Order between different tags may change since word order
 * differs between languages.
 */

use std::collections::BTreeMap;
use std::fmt;

use log::debug;

use crate::document::parse_fragment;
use crate::translation::placeholders;

/// Why placeholders in a translation do not match the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceholderIssue {
    /// A tag that does not appear in the source
    UnknownTag(String),
    /// A tag that appears a different number of times
    CountMismatch {
        token: String,
        expected: usize,
        found: usize,
    },
    /// Open and close tags cross or are left open
    BadNesting,
    /// The text around the tags does not parse back into markup
    NotWellFormed(String),
    /// Text of a raw-text element would close its element early
    ClosesRawText(String),
}

impl fmt::Display for PlaceholderIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaceholderIssue::UnknownTag(token) => write!(f, "unexpected tag {}", token),
            PlaceholderIssue::CountMismatch {
                token,
                expected,
                found,
            } => write!(f, "expected {} x {}, found {}", expected, token, found),
            PlaceholderIssue::BadNesting => write!(f, "tags are not properly nested"),
            PlaceholderIssue::NotWellFormed(error) => write!(f, "output is not well-formed: {}", error),
            PlaceholderIssue::ClosesRawText(name) => write!(f, "output closes <{}>", name),
        }
    }
}

/// Validates placeholder preservation
#[derive(Debug, Clone, Default)]
pub struct PlaceholderValidator;

impl PlaceholderValidator {
    pub fn new() -> Self {
        Self
    }

    fn count_tokens(text: &str) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for (_, _, token) in placeholders::scan_tokens(text) {
            *counts.entry(token).or_insert(0) += 1;
        }
        counts
    }

    /// Check a translation against its source
    pub fn validate(&self, source: &str, translated: &str) -> Result<(), PlaceholderIssue> {
        let expected = Self::count_tokens(source);
        let found = Self::count_tokens(translated);

        if let Some(token) = found.keys().find(|t| !expected.contains_key(*t)) {
            debug!("Unknown tag in translation: {}", token);
            return Err(PlaceholderIssue::UnknownTag(token.to_string()));
        }

        for (token, count) in &expected {
            let actual = found.get(token).copied().unwrap_or(0);
            if actual != *count {
                debug!("Tag count mismatch for {}: {} != {}", token, actual, count);
                return Err(PlaceholderIssue::CountMismatch {
                    token: token.to_string(),
                    expected: *count,
                    found: actual,
                });
            }
        }

        if !placeholders::is_well_nested(translated) {
            return Err(PlaceholderIssue::BadNesting);
        }

        // Placeholders are tags with the source names, so a parse here
        // stands in for the decoded run
        if let Err(error) = parse_fragment(translated) {
            debug!("Translation does not parse: {}", error);
            return Err(PlaceholderIssue::NotWellFormed(error.to_string()));
        }
        Ok(())
    }

    /// Check a translation of text inside a raw-text element such as `<title>`.
    ///
    /// Tags there are plain characters; only a close tag of the element
    /// itself would change the document.
    pub fn validate_raw_text(&self, element: &str, translated: &str) -> Result<(), PlaceholderIssue> {
        let close = format!("</{}", element.to_ascii_lowercase());
        if translated.to_ascii_lowercase().contains(&close) {
            return Err(PlaceholderIssue::ClosesRawText(element.to_string()));
        }
        Ok(())
    }
}

/*!
 * Context window for translation calls.
 *
 * Every call carries a little of the surrounding text so the translation
 * reads continuously across unit boundaries: the units before it (their
 * translation when one is already known, the source otherwise) and the
 * source of the units after it. Translations land in a shared snapshot as
 * units validate; readers take whatever is there at dispatch time, so context
 * from neighbours still in flight may be stale.
 */

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::placeholders;
use super::unit::Unit;
use crate::document::DocumentMetadata;

/// Context window sizes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Units before the current one to include
    #[serde(default = "default_preceding_units")]
    pub preceding_units: usize,

    /// Units after the current one to include
    #[serde(default = "default_following_units")]
    pub following_units: usize,

    /// Maximum characters of each of the before and after snippets
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

fn default_preceding_units() -> usize {
    2
}

fn default_following_units() -> usize {
    1
}

fn default_max_context_chars() -> usize {
    600
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            preceding_units: default_preceding_units(),
            following_units: default_following_units(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

/// Shared view of the translations accepted so far, keyed by unit id
#[derive(Debug, Clone, Default)]
pub struct TranslationSnapshot {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl TranslationSnapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an accepted translation
    pub fn insert(&self, unit_id: &str, text: &str) {
        self.inner.write().insert(unit_id.to_string(), text.to_string());
    }

    /// Translation of a unit, if accepted
    pub fn get(&self, unit_id: &str) -> Option<String> {
        self.inner.read().get(unit_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

/// Everything a translation call knows besides the text itself
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitContext {
    /// Text preceding the unit
    pub before: String,
    /// Source text following the unit
    pub after: String,
    /// Document title
    pub title: Option<String>,
    /// Document language
    pub source_language: String,
    /// Language to translate into
    pub target_language: String,
    /// Why the previous attempt was rejected, if it was
    pub previous_failure: Option<String>,
}

/// Builds the context of each unit
#[derive(Debug, Clone, Default)]
pub struct ContextWindow {
    config: ContextConfig,
}

impl ContextWindow {
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    /// Fill the source-side context snippets of every unit
    pub fn annotate(&self, units: &mut [Unit]) {
        let plain: Vec<String> = units
            .iter()
            .map(|u| placeholders::strip_tokens(&u.source_text))
            .collect();

        for (i, unit) in units.iter_mut().enumerate() {
            let from = i.saturating_sub(self.config.preceding_units);
            let to = (i + 1 + self.config.following_units).min(plain.len());
            unit.context_before = tail_chars(&plain[from..i].join("\n"), self.config.max_context_chars).to_string();
            unit.context_after = head_chars(&plain[i + 1..to].join("\n"), self.config.max_context_chars).to_string();
        }
    }

    /// Context of unit `i`, preferring accepted translations of the preceding units
    pub fn for_unit(
        &self,
        units: &[Unit],
        i: usize,
        snapshot: &TranslationSnapshot,
        metadata: &DocumentMetadata,
        target_language: &str,
    ) -> UnitContext {
        let from = i.saturating_sub(self.config.preceding_units);
        let to = (i + 1 + self.config.following_units).min(units.len());

        let before: Vec<String> = units[from..i.min(units.len())]
            .iter()
            .map(|u| {
                let text = u
                    .translated_text
                    .clone()
                    .or_else(|| snapshot.get(&u.id))
                    .unwrap_or_else(|| u.source_text.clone());
                placeholders::strip_tokens(&text)
            })
            .collect();
        let after: Vec<String> = units[(i + 1).min(to)..to]
            .iter()
            .map(|u| placeholders::strip_tokens(&u.source_text))
            .collect();

        UnitContext {
            before: tail_chars(&before.join("\n"), self.config.max_context_chars).to_string(),
            after: head_chars(&after.join("\n"), self.config.max_context_chars).to_string(),
            title: metadata.title.clone(),
            source_language: metadata.language.clone(),
            target_language: target_language.to_string(),
            previous_failure: units
                .get(i)
                .and_then(|u| u.failure_reason.clone())
                .filter(|reason| !is_call_failure(reason)),
        }
    }
}

/// Failures of the call itself say nothing about the previous answer
fn is_call_failure(reason: &str) -> bool {
    ["provider-error", "timeout", "interrupted"]
        .iter()
        .any(|prefix| reason.starts_with(prefix))
}

/// Last `max` characters of `text`
fn tail_chars(text: &str, max: usize) -> &str {
    let count = text.chars().count();
    if count <= max {
        return text;
    }
    match text.char_indices().nth(count - max) {
        Some((byte, _)) => &text[byte..],
        None => "",
    }
}

/// First `max` characters of `text`
fn head_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

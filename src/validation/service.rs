/*!
 * Validator that runs every check on a translated unit.
 *
 * Checks run in a fixed order and stop at the first failure:
 * empty output, placeholders, length ratio, repetition, leftover source
 * script (when enabled), and direction marks (atomic units only).
 */

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use super::directionality;
use super::length::{LengthIssue, LengthValidator, LengthValidatorConfig};
use super::markers::{PlaceholderIssue, PlaceholderValidator};
use super::repetition::RepetitionValidator;
use super::script::{self, ScriptRange, ScriptValidator};
use crate::translation::unit::{Unit, UnitKind};

/// Configuration for the validator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Minimum acceptable length ratio
    #[serde(default = "default_min_ratio")]
    pub min_length_ratio: f64,

    /// Maximum acceptable length ratio
    #[serde(default = "default_max_ratio")]
    pub max_length_ratio: f64,

    /// Sources shorter than this (visible chars) skip the ratio check
    #[serde(default = "default_min_source_chars")]
    pub min_source_chars_for_ratio: usize,

    /// Whether to reject looping output
    #[serde(default = "default_true")]
    pub repetition_check: bool,

    /// Words per repetition window
    #[serde(default = "default_repetition_window")]
    pub repetition_window: usize,

    /// Occurrences in one window that count as repeated
    #[serde(default = "default_repetition_threshold")]
    pub repetition_threshold: usize,

    /// Whether to reject output containing source-script characters
    #[serde(default)]
    pub source_script_check: bool,

    /// Code point ranges of the source script
    #[serde(default = "default_source_script_ranges")]
    pub source_script_ranges: Vec<ScriptRange>,

    /// Source-script characters tolerated in the output
    #[serde(default)]
    pub max_source_script_chars: usize,
}

fn default_true() -> bool {
    true
}

fn default_min_ratio() -> f64 {
    0.1
}

fn default_max_ratio() -> f64 {
    4.0
}

fn default_min_source_chars() -> usize {
    20
}

fn default_repetition_window() -> usize {
    200
}

fn default_repetition_threshold() -> usize {
    20
}

fn default_source_script_ranges() -> Vec<ScriptRange> {
    script::HEBREW.to_vec()
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_length_ratio: default_min_ratio(),
            max_length_ratio: default_max_ratio(),
            min_source_chars_for_ratio: default_min_source_chars(),
            repetition_check: true,
            repetition_window: default_repetition_window(),
            repetition_threshold: default_repetition_threshold(),
            source_script_check: false,
            source_script_ranges: default_source_script_ranges(),
            max_source_script_chars: 0,
        }
    }
}

/// Why a translation was rejected
#[derive(Debug, Clone, PartialEq)]
pub enum InvalidReason {
    EmptyOutput,
    PlaceholderMismatch(PlaceholderIssue),
    LengthRatio(LengthIssue),
    AbnormalRepetition(Vec<String>),
    SourceScriptLeftover(String),
    DirectionalityStripped(char),
}

impl InvalidReason {
    /// Short stable code of the failure
    pub fn code(&self) -> &'static str {
        match self {
            InvalidReason::EmptyOutput => "empty-output",
            InvalidReason::PlaceholderMismatch(_) => "placeholder-mismatch",
            InvalidReason::LengthRatio(_) => "length-ratio",
            InvalidReason::AbnormalRepetition(_) => "abnormal-repetition",
            InvalidReason::SourceScriptLeftover(_) => "source-script-leftover",
            InvalidReason::DirectionalityStripped(_) => "directionality-stripped",
        }
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::EmptyOutput => write!(f, "{}", self.code()),
            InvalidReason::PlaceholderMismatch(issue) => write!(f, "{}: {}", self.code(), issue),
            InvalidReason::LengthRatio(issue) => write!(f, "{}: {}", self.code(), issue),
            InvalidReason::AbnormalRepetition(words) => {
                write!(f, "{}: {}", self.code(), words.join(", "))
            }
            InvalidReason::SourceScriptLeftover(snippet) => {
                write!(f, "{}: \"...{}...\"", self.code(), snippet)
            }
            InvalidReason::DirectionalityStripped(mark) => {
                write!(f, "{}: U+{:04X}", self.code(), *mark as u32)
            }
        }
    }
}

/// Outcome of validating one translation
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Valid,
    Invalid(InvalidReason),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }
}

/// Runs every check on a translated unit
#[derive(Debug, Clone)]
pub struct Validator {
    placeholders: PlaceholderValidator,
    length: LengthValidator,
    repetition: Option<RepetitionValidator>,
    script: Option<ScriptValidator>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(&ValidationConfig::default())
    }
}

impl Validator {
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            placeholders: PlaceholderValidator::new(),
            length: LengthValidator::with_config(LengthValidatorConfig {
                min_ratio: config.min_length_ratio,
                max_ratio: config.max_length_ratio,
                min_source_length_for_ratio: config.min_source_chars_for_ratio,
            }),
            repetition: config
                .repetition_check
                .then(|| RepetitionValidator::new(config.repetition_window, config.repetition_threshold)),
            script: config.source_script_check.then(|| {
                ScriptValidator::new(config.source_script_ranges.clone(), config.max_source_script_chars)
            }),
        }
    }

    /// Validate the translation of a unit
    pub fn validate(&self, unit: &Unit, translated: &str) -> Validation {
        match self.check(unit, translated) {
            Ok(()) => Validation::Valid,
            Err(reason) => {
                debug!("Unit {} rejected: {}", unit.id, reason);
                Validation::Invalid(reason)
            }
        }
    }

    fn check(&self, unit: &Unit, translated: &str) -> Result<(), InvalidReason> {
        let source = unit.source_text.as_str();

        if translated.trim().is_empty() {
            return Err(InvalidReason::EmptyOutput);
        }

        match &unit.raw_text_element {
            Some(element) => self.placeholders.validate_raw_text(element, translated),
            None => self.placeholders.validate(source, translated),
        }
        .map_err(InvalidReason::PlaceholderMismatch)?;

        self.length
            .validate(source, translated)
            .map_err(InvalidReason::LengthRatio)?;

        if let Some(repetition) = &self.repetition {
            let words = repetition.repeated_words(translated);
            if !words.is_empty() {
                return Err(InvalidReason::AbnormalRepetition(words));
            }
        }

        if let Some(script) = &self.script {
            if let Some(snippet) = script.leftover(translated) {
                return Err(InvalidReason::SourceScriptLeftover(snippet));
            }
        }

        if unit.kind == UnitKind::Atomic {
            if let Some(mark) = directionality::missing_mark(source, translated) {
                return Err(InvalidReason::DirectionalityStripped(mark));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::unit::UnitPosition;

    fn unit(kind: UnitKind, text: &str) -> Unit {
        let position = UnitPosition {
            path: "/p[0]#r0#f0".to_string(),
            run: 0,
            fragment_index: 0,
            fragment_count: 1,
            start: 0,
            end: text.len(),
            leading_ws: String::new(),
            trailing_ws: String::new(),
        };
        Unit::new(0, kind, text.to_string(), position, text)
    }

    #[test]
    fn test_validate_withPreservedPlaceholders_shouldBeValid() {
        let validator = Validator::default();
        let u = unit(UnitKind::Atomic, "Hello, <b>world</b>.");
        assert_eq!(validator.validate(&u, "Bonjour, <b>monde</b>."), Validation::Valid);
    }

    #[test]
    fn test_validate_withDroppedPlaceholders_shouldReportMismatch() {
        let validator = Validator::default();
        let u = unit(UnitKind::Atomic, "Hello, <b>world</b>.");
        match validator.validate(&u, "Bonjour.") {
            Validation::Invalid(reason) => assert_eq!(reason.code(), "placeholder-mismatch"),
            Validation::Valid => panic!("expected placeholder mismatch"),
        }
    }

    #[test]
    fn test_validate_withEmptyOutput_shouldFailFirst() {
        let validator = Validator::default();
        let u = unit(UnitKind::SplittableFragment, "<b>Some text</b>");
        assert_eq!(
            validator.validate(&u, "  \n"),
            Validation::Invalid(InvalidReason::EmptyOutput)
        );
    }

    #[test]
    fn test_validate_withTruncatedOutput_shouldReportLengthRatio() {
        let validator = Validator::default();
        let u = unit(
            UnitKind::SplittableFragment,
            "A long paragraph of text that goes on for quite a while before it ends.",
        );
        match validator.validate(&u, "Un.") {
            Validation::Invalid(reason) => assert_eq!(reason.code(), "length-ratio"),
            Validation::Valid => panic!("expected length ratio failure"),
        }
    }

    #[test]
    fn test_validate_shouldOnlyCheckDirectionMarksOnAtomicUnits() {
        let validator = Validator::default();
        let source = "\u{200F}המשך\u{200F}";
        let atomic = unit(UnitKind::Atomic, source);
        let fragment = unit(UnitKind::SplittableFragment, source);
        assert!(!validator.validate(&atomic, "Continue").is_valid());
        assert!(validator.validate(&fragment, "Continue").is_valid());
        assert!(validator.validate(&atomic, "\u{200F}Continue\u{200F}").is_valid());
    }

    #[test]
    fn test_validate_withSourceScriptCheck_shouldRejectLeftovers() {
        let validator = Validator::new(&ValidationConfig {
            source_script_check: true,
            ..ValidationConfig::default()
        });
        let u = unit(UnitKind::Atomic, "שלום עולם");
        match validator.validate(&u, "Hello עולם") {
            Validation::Invalid(reason) => assert_eq!(reason.code(), "source-script-leftover"),
            Validation::Valid => panic!("expected leftover failure"),
        }
        assert!(validator.validate(&u, "Hello world").is_valid());
    }

    #[test]
    fn test_invalidReason_display_shouldStartWithCode() {
        let reason = InvalidReason::DirectionalityStripped('\u{200F}');
        assert_eq!(reason.to_string(), "directionality-stripped: U+200F");
    }

    #[test]
    fn test_validate_withUnparseableOutput_shouldReportMismatch() {
        let validator = Validator::default();
        let u = unit(UnitKind::Atomic, "Type &lt;b&gt; for <b>bold</b> text");
        match validator.validate(&u, "Tapez <b>gras</b> pour <b") {
            Validation::Invalid(reason) => {
                assert!(reason.to_string().starts_with("placeholder-mismatch: output is not well-formed"))
            }
            Validation::Valid => panic!("expected unparseable output to be rejected"),
        }
    }

    #[test]
    fn test_validate_withRawTextUnit_shouldTreatTagsAsText() {
        let validator = Validator::default();
        let u = unit(UnitKind::Atomic, "Use <b> for bold").in_raw_text("title");
        assert!(!u.has_placeholders());
        assert!(validator.validate(&u, "Utilisez <b> pour le gras").is_valid());
        match validator.validate(&u, "Gras</title>") {
            Validation::Invalid(reason) => assert_eq!(reason.code(), "placeholder-mismatch"),
            Validation::Valid => panic!("expected early close to be rejected"),
        }
    }
}

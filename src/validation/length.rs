/*!
 * Length validation for translated units.
 *
 * Compares visible text lengths (placeholders stripped, counted in chars) of
 * source and translation. Very short sources are exempt since a single word
 * can legitimately double or halve.
 */

use log::debug;

use crate::translation::placeholders;

/// Default minimum length ratio (translation / source)
const DEFAULT_MIN_LENGTH_RATIO: f64 = 0.1;

/// Default maximum length ratio (translation / source)
const DEFAULT_MAX_LENGTH_RATIO: f64 = 4.0;

/// Types of length issues
#[derive(Debug, Clone, PartialEq)]
pub enum LengthIssue {
    /// Translation is too short relative to source
    TranslationTooShort {
        ratio: f64,
        min_ratio: f64,
        source_len: usize,
        translated_len: usize,
    },
    /// Translation is too long relative to source
    TranslationTooLong {
        ratio: f64,
        max_ratio: f64,
        source_len: usize,
        translated_len: usize,
    },
}

impl std::fmt::Display for LengthIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LengthIssue::TranslationTooShort {
                ratio,
                min_ratio,
                source_len,
                translated_len,
            } => write!(
                f,
                "ratio {:.2} < {:.2} ({} -> {} chars)",
                ratio, min_ratio, source_len, translated_len
            ),
            LengthIssue::TranslationTooLong {
                ratio,
                max_ratio,
                source_len,
                translated_len,
            } => write!(
                f,
                "ratio {:.2} > {:.2} ({} -> {} chars)",
                ratio, max_ratio, source_len, translated_len
            ),
        }
    }
}

/// Configuration for length validation
#[derive(Debug, Clone)]
pub struct LengthValidatorConfig {
    /// Minimum acceptable length ratio (translated / source)
    pub min_ratio: f64,
    /// Maximum acceptable length ratio (translated / source)
    pub max_ratio: f64,
    /// Minimum visible source length for the ratio check to apply
    pub min_source_length_for_ratio: usize,
}

impl Default for LengthValidatorConfig {
    fn default() -> Self {
        Self {
            min_ratio: DEFAULT_MIN_LENGTH_RATIO,
            max_ratio: DEFAULT_MAX_LENGTH_RATIO,
            min_source_length_for_ratio: 20,
        }
    }
}

/// Length validator for translated units
#[derive(Debug, Clone, Default)]
pub struct LengthValidator {
    config: LengthValidatorConfig,
}

impl LengthValidator {
    pub fn with_config(config: LengthValidatorConfig) -> Self {
        Self { config }
    }

    /// Visible length of a text in chars
    pub fn visible_len(text: &str) -> usize {
        placeholders::strip_tokens(text).trim().chars().count()
    }

    /// Check a translation against its source
    pub fn validate(&self, source: &str, translated: &str) -> Result<(), LengthIssue> {
        let source_len = Self::visible_len(source);
        if source_len < self.config.min_source_length_for_ratio.max(1) {
            return Ok(());
        }
        let translated_len = Self::visible_len(translated);
        let ratio = translated_len as f64 / source_len as f64;

        if ratio < self.config.min_ratio {
            debug!("Length ratio {:.2} below {:.2}", ratio, self.config.min_ratio);
            return Err(LengthIssue::TranslationTooShort {
                ratio,
                min_ratio: self.config.min_ratio,
                source_len,
                translated_len,
            });
        }
        if ratio > self.config.max_ratio {
            debug!("Length ratio {:.2} above {:.2}", ratio, self.config.max_ratio);
            return Err(LengthIssue::TranslationTooLong {
                ratio,
                max_ratio: self.config.max_ratio,
                source_len,
                translated_len,
            });
        }
        Ok(())
    }
}

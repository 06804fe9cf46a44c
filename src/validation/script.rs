/*!
 * Leftover source-script detection.
 *
 * When source and target languages use different scripts, characters of the
 * source script in the output mean part of the text was left untranslated.
 */

use serde::{Deserialize, Serialize};

/// Inclusive range of Unicode code points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptRange {
    pub start: u32,
    pub end: u32,
}

impl ScriptRange {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, c: char) -> bool {
        (self.start..=self.end).contains(&(c as u32))
    }
}

/// Hebrew block and Hebrew presentation forms
pub const HEBREW: [ScriptRange; 2] = [ScriptRange::new(0x0590, 0x05FF), ScriptRange::new(0xFB1D, 0xFB4F)];

/// Counts characters from a set of script ranges
#[derive(Debug, Clone)]
pub struct ScriptValidator {
    ranges: Vec<ScriptRange>,
    max_chars: usize,
}

impl ScriptValidator {
    pub fn new(ranges: Vec<ScriptRange>, max_chars: usize) -> Self {
        Self { ranges, max_chars }
    }

    /// Snippet around the first leftover when more than `max_chars` were found
    pub fn leftover(&self, translated: &str) -> Option<String> {
        let chars: Vec<char> = translated.chars().collect();
        let hits: Vec<usize> = chars
            .iter()
            .enumerate()
            .filter(|(_, c)| self.ranges.iter().any(|r| r.contains(**c)))
            .map(|(i, _)| i)
            .collect();
        if hits.len() <= self.max_chars {
            return None;
        }
        let first = hits[0];
        let from = first.saturating_sub(20);
        let to = (first + 20).min(chars.len());
        Some(chars[from..to].iter().collect())
    }
}

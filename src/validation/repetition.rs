/*!
 * Detection of runaway repetition in model output.
 *
 * A model that loses its place tends to loop, emitting the same handful of
 * words over and over. A sliding window of words is counted; when more than
 * two different words each reach the threshold inside one window the output
 * is rejected. Text written without spaces (Chinese, Japanese) is counted
 * per character.
 */

use std::collections::HashMap;

use crate::translation::placeholders;

/// Sliding-window repetition detector
#[derive(Debug, Clone)]
pub struct RepetitionValidator {
    window: usize,
    threshold: usize,
}

impl Default for RepetitionValidator {
    fn default() -> Self {
        Self::new(200, 20)
    }
}

impl RepetitionValidator {
    pub fn new(window: usize, threshold: usize) -> Self {
        Self {
            window: window.max(1),
            threshold: threshold.max(2),
        }
    }

    fn tokens(text: &str) -> Vec<String> {
        let plain = placeholders::strip_tokens(text);
        let words: Vec<String> = plain
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();

        let visible = plain.chars().filter(|c| !c.is_whitespace()).count();
        if words.len() * 10 < visible / 2 {
            return plain
                .chars()
                .filter(|c| c.is_alphanumeric())
                .map(|c| c.to_string())
                .collect();
        }
        words
    }

    /// Words repeated abnormally often, sorted; empty when the text is fine
    pub fn repeated_words(&self, text: &str) -> Vec<String> {
        let tokens = Self::tokens(text);
        if tokens.len() < self.threshold * 3 {
            return Vec::new();
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for (i, token) in tokens.iter().enumerate() {
            *counts.entry(token.as_str()).or_insert(0) += 1;
            if i >= self.window {
                if let Some(count) = counts.get_mut(tokens[i - self.window].as_str()) {
                    *count -= 1;
                }
            }

            let mut repeated: Vec<&str> = counts
                .iter()
                .filter(|(_, count)| **count >= self.threshold)
                .map(|(word, _)| *word)
                .collect();
            if repeated.len() > 2 {
                repeated.sort_unstable();
                return repeated.into_iter().map(|w| w.to_string()).collect();
            }
        }
        Vec::new()
    }
}

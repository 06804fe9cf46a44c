/*!
 * Prompt templates for HTML translation.
 *
 * The system prompt states the language pair and the markup rules; the user
 * prompt carries the surrounding context, a warning when the previous attempt
 * was rejected, and the text itself.
 */

use super::context::UnitContext;
use crate::language_utils;

/// System prompt template for HTML fragment translation
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// The default system prompt
    pub const HTML_TRANSLATOR: &'static str = r#"You are an expert literary translator from {source_language} to {target_language}. You are translating a fragment of the web page "{title}".

## Your Role
- Produce natural, fluent {target_language} that could be published as respected literary work
- Avoid word-for-word translation; adapt idioms, wordplay and cultural references for {target_language} readers
- Keep the tone and register of the original

## Markup Rules
- The text contains simplified HTML tags such as <b>, </b>, <a>, </a>, <br> and <code/>
- Keep every tag exactly as written: same name, same count, no attributes added
- Keep tags around the words they belong to and keep them properly nested
- Preserve HTML entities such as &nbsp; and &amp; exactly; never turn them into characters
- Never replace <br> with a line break or a line break with <br>
- Tags like <code/> stand for content that must not be translated; copy them unchanged

## Output Requirements
- Output ONLY the translated fragment
- No explanations, notes, status updates or questions
- Translate everything, in order, without skipping or summarizing
- Never translate the context sections; they are only there to help you"#;

    /// Create a template from a string
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    /// The default HTML translator template
    pub fn html_translator() -> Self {
        Self::new(Self::HTML_TRANSLATOR)
    }

    /// Render the template.
    ///
    /// Language codes are replaced by their English names when known.
    pub fn render(&self, source_language: &str, target_language: &str, title: Option<&str>) -> String {
        self.template
            .replace("{source_language}", &display_language(source_language))
            .replace("{target_language}", &display_language(target_language))
            .replace("{title}", title.unwrap_or("untitled"))
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::html_translator()
    }
}

fn display_language(code: &str) -> String {
    language_utils::get_language_name(code).unwrap_or_else(|_| code.to_string())
}

/// Line that introduces the text in the user prompt
const INSTRUCTION_PREFIX: &str = "Translate the following text into";

/// Build the user message for one unit
pub fn build_user_prompt(text: &str, context: &UnitContext) -> String {
    let mut prompt = String::new();

    if !context.before.is_empty() {
        prompt.push_str("<context-before>\n");
        prompt.push_str(&context.before);
        prompt.push_str("\n</context-before>\n\n");
    }
    if !context.after.is_empty() {
        prompt.push_str("<context-after>\n");
        prompt.push_str(&context.after);
        prompt.push_str("\n</context-after>\n\n");
    }
    if let Some(reason) = &context.previous_failure {
        prompt.push_str(&format!(
            "Warning: your previous answer was rejected ({}). {} Do not repeat this mistake.\n\n",
            reason,
            failure_hint(reason)
        ));
    }

    prompt.push_str(&format!(
        "{} {}:\n{}",
        INSTRUCTION_PREFIX,
        display_language(&context.target_language),
        text
    ));
    prompt
}

/// The text to translate, recovered from a user prompt built by `build_user_prompt`
pub fn text_to_translate(prompt: &str) -> &str {
    let Some(start) = prompt.rfind(INSTRUCTION_PREFIX) else {
        return prompt;
    };
    let rest = &prompt[start..];
    match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => "",
    }
}

fn failure_hint(reason: &str) -> &'static str {
    let code = reason.split(':').next().unwrap_or(reason).trim();
    match code {
        "empty-output" => "You returned nothing. Translate the whole text.",
        "placeholder-mismatch" => "Some tags were lost, altered or moved. Keep every tag exactly.",
        "length-ratio" => "The length was far from the original. Translate all of it and nothing more.",
        "abnormal-repetition" => "Words were repeated abnormally. Translate the text once, in order.",
        "source-script-leftover" => "Untranslated source text remained. Translate all of it.",
        "directionality-stripped" => "Direction marks were removed. Keep every direction mark.",
        _ => "Follow the rules exactly.",
    }
}

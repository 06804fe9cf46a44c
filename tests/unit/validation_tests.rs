/*!
 * Tests for answer validation on real chunked units
 */

use std::sync::Arc;

use yahtwai::document::parse_document;
use yahtwai::translation::{chunk, ChunkerConfig, Unit};
use yahtwai::validation::{InvalidReason, Validation, ValidationConfig, Validator};

use crate::common::SAMPLE_HTML;

fn unit_starting_with(prefix: &str) -> Unit {
    let document = Arc::new(parse_document(SAMPLE_HTML).unwrap());
    chunk(document, &ChunkerConfig::default())
        .units
        .into_iter()
        .find(|u| u.source_text.starts_with(prefix))
        .unwrap()
}

fn reason_code(validation: Validation) -> Option<&'static str> {
    match validation {
        Validation::Valid => None,
        Validation::Invalid(reason) => Some(reason.code()),
    }
}

#[test]
fn test_validate_withTranslatedTags_shouldAcceptAnswer() {
    let unit = unit_starting_with("Hello");
    let validator = Validator::default();
    assert_eq!(validator.validate(&unit, "Bonjour, <b>monde</b>."), Validation::Valid);
}

#[test]
fn test_validate_withLostTags_shouldReportPlaceholderMismatch() {
    let unit = unit_starting_with("Hello");
    let validator = Validator::default();
    assert_eq!(
        reason_code(validator.validate(&unit, "Bonjour.")),
        Some("placeholder-mismatch")
    );
}

#[test]
fn test_validate_withReorderedTags_shouldAcceptWhenWellNested() {
    let unit = unit_starting_with("The keeper");
    let validator = Validator::default();
    let answer = "Chaque soir, le gardien montait <em>deux cents</em> marches.<br>Il ne les comptait jamais à voix haute.";
    assert!(validator.validate(&unit, answer).is_valid());
}

#[test]
fn test_validate_withEmptyOrTruncatedAnswer_shouldReject() {
    let unit = unit_starting_with("The keeper");
    let validator = Validator::default();

    assert_eq!(
        validator.validate(&unit, "   "),
        Validation::Invalid(InvalidReason::EmptyOutput)
    );
    assert_eq!(
        reason_code(validator.validate(&unit, "Le <em>x</em><br>")),
        Some("length-ratio")
    );
}

#[test]
fn test_validate_withRepetitionLoop_shouldReject() {
    let unit = unit_starting_with("The keeper");
    let validator = Validator::new(&ValidationConfig {
        max_length_ratio: 50.0,
        ..ValidationConfig::default()
    });
    let looped = format!("Le gardien <em>montait</em>{}<br>fin.", " la marche du phare".repeat(30));
    assert_eq!(reason_code(validator.validate(&unit, &looped)), Some("abnormal-repetition"));
}

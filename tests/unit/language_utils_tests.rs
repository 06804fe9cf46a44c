/*!
 * Tests for language utility functions
 */

use yahtwai::language_utils::{
    get_language_name, language_codes_match, normalize_language_code, primary_subtag, validate_language_code,
};

/// Test validation of HTML language tags
#[test]
fn test_validateLanguageCode_withRegionalTags_shouldAccept() {
    assert!(validate_language_code("en").is_ok());
    assert!(validate_language_code("en-US").is_ok());
    assert!(validate_language_code("pt_BR").is_ok());
    assert!(validate_language_code("heb").is_ok());
    assert!(validate_language_code("ger").is_ok());

    assert!(validate_language_code("").is_err());
    assert!(validate_language_code("english").is_err());
}

/// Test matching across ISO 639 forms
#[test]
fn test_languageCodesMatch_shouldIgnoreRegionAndCodeForm() {
    assert!(language_codes_match("en-GB", "eng"));
    assert!(language_codes_match("de", "ger"));
    assert!(!language_codes_match("pt", "es"));
    assert!(!language_codes_match("", ""));
}

#[test]
fn test_normalizeLanguageCode_shouldReturnTwoLetterForm() {
    assert_eq!(normalize_language_code("fra").unwrap(), "fr");
    assert_eq!(normalize_language_code("he-IL").unwrap(), "he");
    assert_eq!(primary_subtag("sr-Latn-RS"), "sr");
    assert_eq!(get_language_name("ar").unwrap(), "Arabic");
}

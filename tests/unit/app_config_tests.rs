/*!
 * Tests for configuration loading and validation
 */

use yahtwai::app_config::{Config, LogLevel, TranslationProvider};

use crate::common;

#[test]
fn test_loadOrCreate_withMissingFile_shouldWriteDefaults() {
    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("conf.json");

    let (config, created) = Config::load_or_create(&path).unwrap();
    assert!(created);
    assert!(path.exists());
    assert_eq!(config.target_language, "en");

    let (reloaded, created) = Config::load_or_create(&path).unwrap();
    assert!(!created);
    assert_eq!(reloaded.translation.provider, config.translation.provider);
    assert_eq!(reloaded.pipeline.retry.max_attempts, config.pipeline.retry.max_attempts);
}

#[test]
fn test_loadOrCreate_withPartialFile_shouldFillDefaults() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(
        dir.path(),
        "conf.json",
        r#"{
            "target_language": "he",
            "translation": { "provider": "mock" },
            "pipeline": { "chunker": { "max_unit_chars": 800 }, "rewrite_language_attributes": true },
            "log_level": "debug"
        }"#,
    )
    .unwrap();

    let (config, _) = Config::load_or_create(&path).unwrap();
    assert_eq!(config.translation.provider, TranslationProvider::Mock);
    assert_eq!(config.pipeline.chunker.max_unit_chars, 800);
    assert_eq!(config.pipeline.chunker.min_split_chars, 120);
    assert!(config.pipeline.rewrite_language_attributes);
    assert_eq!(config.log_level, LogLevel::Debug);
    assert!(config.validate().is_ok());
}

#[test]
fn test_loadOrCreate_withInvalidJson_shouldFail() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(dir.path(), "conf.json", "{ not json").unwrap();
    assert!(Config::load_or_create(&path).is_err());
}

#[test]
fn test_validate_withUnknownLanguage_shouldFail() {
    let mut config = Config::default();
    config.target_language = "zz".to_string();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.source_language = Some("xx".to_string());
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_withBadEndpoint_shouldFail() {
    let mut config = Config::default();
    config.translation.active_provider_config_mut().endpoint = "not a url".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_providerFromStr_shouldBeCaseInsensitive() {
    assert_eq!("Anthropic".parse::<TranslationProvider>().unwrap(), TranslationProvider::Anthropic);
    assert_eq!("OLLAMA".parse::<TranslationProvider>().unwrap(), TranslationProvider::Ollama);
    assert!("openai".parse::<TranslationProvider>().is_err());
}

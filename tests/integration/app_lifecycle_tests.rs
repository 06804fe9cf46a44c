/*!
 * Integration tests for the controller over files and directories
 */

use std::fs;
use std::sync::Arc;

use yahtwai::app_config::{Config, TranslationProvider};
use yahtwai::app_controller::Controller;
use yahtwai::ledger::JobStatus;
use yahtwai::providers::mock::MockProvider;
use yahtwai::translation::JobReport;

use crate::common::{self, memory_ledger, to_french, SAMPLE_HTML};

fn french_config() -> Config {
    let mut config = Config::default();
    config.target_language = "fr".to_string();
    config.translation.provider = TranslationProvider::Mock;
    config
}

fn controller(config: Config, provider: &MockProvider) -> Controller {
    Controller::with_components(config, Arc::new(provider.clone()), memory_ledger())
}

#[tokio::test]
async fn test_run_withDirectory_shouldMirrorLayoutUnderTargetLanguage() {
    let input = common::create_temp_dir().unwrap();
    let output = common::create_temp_dir().unwrap();
    common::create_test_file(input.path(), "chapter1.html", SAMPLE_HTML).unwrap();
    common::create_test_file(input.path(), "part2/chapter2.htm", SAMPLE_HTML).unwrap();
    common::create_test_file(input.path(), "notes.txt", "not a document").unwrap();

    let provider = MockProvider::working().with_custom_response(to_french);
    let controller = controller(french_config(), &provider);
    let summary = controller
        .run(input.path().to_path_buf(), output.path().to_path_buf(), false)
        .await
        .unwrap();

    assert_eq!(summary.completed, 2);
    assert!(!summary.has_problems());

    let first = output.path().join("fr/chapter1.html");
    let second = output.path().join("fr/part2/chapter2.htm");
    assert!(fs::read_to_string(&first).unwrap().contains("Bonjour, <b>monde</b>."));
    assert!(second.exists());
    assert!(!output.path().join("fr/notes.txt").exists());

    let report: JobReport =
        serde_json::from_str(&fs::read_to_string(output.path().join("fr/chapter1.html.report.json")).unwrap())
            .unwrap();
    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(report.document_key, "chapter1.html");
    assert_eq!(report.target_language, "fr");
}

#[tokio::test]
async fn test_run_twice_shouldSkipCompletedDocuments() {
    let input = common::create_temp_dir().unwrap();
    let output = common::create_temp_dir().unwrap();
    let file = common::create_test_file(input.path(), "page.html", SAMPLE_HTML).unwrap();

    let provider = MockProvider::working();
    let controller = controller(french_config(), &provider);
    controller
        .run(file.clone(), output.path().to_path_buf(), false)
        .await
        .unwrap();
    let calls = provider.request_count();

    let again = controller
        .run(file.clone(), output.path().to_path_buf(), false)
        .await
        .unwrap();
    assert_eq!(again.skipped, 1);
    assert_eq!(provider.request_count(), calls);

    let forced = controller
        .run(file, output.path().to_path_buf(), true)
        .await
        .unwrap();
    assert_eq!(forced.completed, 1);
    assert_eq!(provider.request_count(), calls);
}

#[tokio::test]
async fn test_run_withOtherSourceLanguage_shouldSkipDocument() {
    let input = common::create_temp_dir().unwrap();
    let output = common::create_temp_dir().unwrap();
    let file = common::create_test_file(input.path(), "page.html", SAMPLE_HTML).unwrap();

    let mut config = french_config();
    config.source_language = Some("he".to_string());
    let provider = MockProvider::working();
    let summary = controller(config, &provider)
        .run(file, output.path().to_path_buf(), false)
        .await
        .unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(provider.request_count(), 0);
    assert!(!output.path().join("fr/page.html").exists());
}

#[tokio::test]
async fn test_run_withFailingProvider_shouldWritePartialOutputAndReport() {
    let input = common::create_temp_dir().unwrap();
    let output = common::create_temp_dir().unwrap();
    let file = common::create_test_file(input.path(), "page.html", SAMPLE_HTML).unwrap();

    let mut config = french_config();
    config.pipeline.retry.max_attempts = 1;
    let provider = MockProvider::rejecting();
    let summary = controller(config, &provider)
        .run(file, output.path().to_path_buf(), false)
        .await
        .unwrap();

    assert_eq!(summary.partial, 1);
    assert!(summary.has_problems());
    let html = fs::read_to_string(output.path().join("fr/page.html")).unwrap();
    assert!(html.contains("<!--yahtwai:untranslated "));
    let report: JobReport =
        serde_json::from_str(&fs::read_to_string(output.path().join("fr/page.html.report.json")).unwrap()).unwrap();
    assert_eq!(report.failures.len(), report.total_units);
}

#[tokio::test]
async fn test_run_withMalformedDocument_shouldContinueWithOthers() {
    let input = common::create_temp_dir().unwrap();
    let output = common::create_temp_dir().unwrap();
    common::create_test_file(input.path(), "a_broken.html", "<html lang=\"en\"><body><div>Open").unwrap();
    common::create_test_file(input.path(), "b_good.html", SAMPLE_HTML).unwrap();

    let provider = MockProvider::working();
    let summary = controller(french_config(), &provider)
        .run(input.path().to_path_buf(), output.path().to_path_buf(), false)
        .await
        .unwrap();

    assert_eq!(summary.errors, 1);
    assert_eq!(summary.completed, 1);
    assert!(output.path().join("fr/b_good.html").exists());
}

#[tokio::test]
async fn test_status_shouldListRecordedJobs() {
    let input = common::create_temp_dir().unwrap();
    let output = common::create_temp_dir().unwrap();
    let file = common::create_test_file(input.path(), "page.html", SAMPLE_HTML).unwrap();

    let provider = MockProvider::working();
    let controller = controller(french_config(), &provider);
    controller
        .run(file, output.path().to_path_buf(), false)
        .await
        .unwrap();

    let jobs = controller.status().await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].document_key, "page.html");
    assert_eq!(jobs[0].status, JobStatus::Completed);
    assert_eq!(jobs[0].counts.validated, jobs[0].counts.total());
    assert!(!jobs[0].resumable);
}

/*!
 * Integration tests for the full translation pipeline.
 *
 * Documents go through chunking, mock translation, validation, the ledger and
 * reassembly exactly as they do from the command line.
 */

use yahtwai::document::parse_document;
use yahtwai::errors::{JobError, ReassembleError};
use yahtwai::ledger::JobStatus;
use yahtwai::providers::mock::MockProvider;
use yahtwai::translation::reassembler::UNTRANSLATED_CLOSE;
use yahtwai::translation::{CancellationFlag, UnitStatus};

use crate::common::{self, fast_config, long_document, memory_ledger, run_job, to_french, SAMPLE_HTML};

#[tokio::test]
async fn test_pipeline_withIdentityTranslation_shouldReproduceSourceExactly() {
    let provider = MockProvider::working();
    let (job, report) = run_job(SAMPLE_HTML, &provider, memory_ledger(), fast_config())
        .await
        .unwrap();

    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(report.validated, report.total_units);
    assert!(report.failures.is_empty());
    assert_eq!(job.reassemble().unwrap().to_html(), SAMPLE_HTML);
}

#[tokio::test]
async fn test_pipeline_withSplitParagraph_shouldReproduceSourceExactly() {
    let html = long_document(40);
    let mut config = fast_config();
    config.chunker.max_unit_chars = 300;

    let provider = MockProvider::working();
    let (job, report) = run_job(&html, &provider, memory_ledger(), config).await.unwrap();

    assert!(report.total_units > 5);
    assert_eq!(report.translation_calls, report.total_units);
    assert_eq!(job.reassemble().unwrap().to_html(), html);
}

#[tokio::test]
async fn test_pipeline_withTranslation_shouldKeepMarkupAndUntranslatableContent() {
    let provider = MockProvider::working().with_custom_response(to_french);
    let (job, report) = run_job(SAMPLE_HTML, &provider, memory_ledger(), fast_config())
        .await
        .unwrap();
    assert_eq!(report.status, JobStatus::Completed);

    let html = job.reassemble().unwrap().to_html();
    assert!(html.contains("<p class=\"lead\">Bonjour, <b>monde</b>.</p>"));
    assert!(html.contains("<p>Le gardien montait <em>two hundred</em> steps every evening.<br>He never counted them aloud.</p>"));
    assert!(html.contains("<button type=\"button\">Continuer la lecture</button>"));
    assert!(html.contains("<a href=\"/notes#n1\" title=\"Note one\">les notes</a>"));
    assert!(html.contains("<!-- generated from chapter-1.md -->"));
    assert!(html.contains("<script>var pages = 12;</script>"));
    assert!(html.contains("<blockquote lang=\"la\"><p>Lux in tenebris.</p></blockquote>"));
    assert!(html.starts_with("<!DOCTYPE html>\n<html lang=\"en\">"));
}

#[tokio::test]
async fn test_pipeline_withRewriteLanguage_shouldUpdateRootTag() {
    let mut config = fast_config();
    config.rewrite_language_attributes = true;
    let provider = MockProvider::working();
    let (job, _) = run_job(SAMPLE_HTML, &provider, memory_ledger(), config).await.unwrap();

    let document = job.reassemble().unwrap();
    assert!(document.to_html().contains("<html lang=\"fr\" dir=\"ltr\">"));
    let root = document.root_element().unwrap();
    assert_eq!(root.attr("lang"), Some("fr"));
}

#[tokio::test]
async fn test_pipeline_withProviderAlwaysFailing_shouldExhaustAttempts() {
    let provider = MockProvider::failing();
    let (job, report) = run_job(SAMPLE_HTML, &provider, memory_ledger(), fast_config())
        .await
        .unwrap();

    assert_eq!(report.status, JobStatus::Partial);
    assert_eq!(report.failed_permanent, report.total_units);
    assert_eq!(report.failures.len(), report.total_units);
    for failure in &report.failures {
        assert_eq!(failure.attempt_count, 3);
        assert!(failure.reason.starts_with("provider-error: "), "{}", failure.reason);
        assert!(failure.end > failure.start);
    }
    assert_eq!(report.translation_calls, report.total_units * 3);
    assert_eq!(report.total_attempts, (report.total_units * 3) as u64);

    let html = job.reassemble().unwrap().to_html();
    assert_eq!(html.matches(UNTRANSLATED_CLOSE).count(), report.total_units);
    assert!(html.contains("Hello, <b>world</b>.<!--/yahtwai:untranslated-->"));
}

#[tokio::test]
async fn test_pipeline_withAnswersAfterTimeout_shouldRetryThenFail() {
    let mut config = fast_config();
    config.retry.call_timeout_ms = Some(20);
    let provider = MockProvider::slow(500);
    let (_, report) = run_job(SAMPLE_HTML, &provider, memory_ledger(), config).await.unwrap();

    assert_eq!(report.status, JobStatus::Partial);
    assert_eq!(report.failed_permanent, report.total_units);
    for failure in &report.failures {
        assert_eq!(failure.attempt_count, 3);
        assert!(failure.reason.starts_with("timeout: "), "{}", failure.reason);
    }
    assert_eq!(provider.request_count(), report.total_units * 3);
    assert_eq!(provider.overlapping_requests(), 0);
}

#[tokio::test]
async fn test_pipeline_withDroppedTags_shouldRetryThenFailOnlyTaggedUnits() {
    let provider = MockProvider::drop_tags();
    let (job, report) = run_job(SAMPLE_HTML, &provider, memory_ledger(), fast_config())
        .await
        .unwrap();

    let tagged = job.units().iter().filter(|u| u.has_placeholders()).count();
    assert_eq!(report.failed_permanent, tagged);
    assert_eq!(report.validated, report.total_units - tagged);
    for failure in &report.failures {
        assert_eq!(failure.attempt_count, 3);
        assert!(failure.reason.starts_with("placeholder-mismatch"), "{}", failure.reason);
    }
    assert_eq!(report.status, JobStatus::Partial);
}

const LITERAL_TAGS_HTML: &str = "<!DOCTYPE html>\n<html lang=\"en\">\n<head><title>Use <b> for bold</title></head>\n<body>\n<p>For <b>bold</b>, type &lt;strong</p>\n</body>\n</html>\n";

#[tokio::test]
async fn test_pipeline_withDecodedEntity_shouldRejectOutputAndStillReassemble() {
    let provider =
        MockProvider::working().with_custom_response(|text| text.replace("&lt;", "<").replace("Use", "Utilisez"));
    let (job, report) = run_job(LITERAL_TAGS_HTML, &provider, memory_ledger(), fast_config())
        .await
        .unwrap();

    assert_eq!(report.total_units, 2);
    assert_eq!(report.validated, 1);
    assert_eq!(report.failed_permanent, 1);
    let failure = &report.failures[0];
    assert_eq!(failure.attempt_count, 3);
    assert!(
        failure.reason.starts_with("placeholder-mismatch: output is not well-formed"),
        "{}",
        failure.reason
    );

    let html = job.reassemble().unwrap().to_html();
    assert!(html.contains("<title>Utilisez <b> for bold</title>"));
    assert!(html.contains("For <b>bold</b>, type &lt;strong<!--/yahtwai:untranslated-->"));
    let reparsed = parse_document(&html).unwrap();
    assert_eq!(reparsed.metadata().title.as_deref(), Some("Utilisez <b> for bold"));
}

#[tokio::test]
async fn test_pipeline_withTagInTitle_shouldTranslateItAsText() {
    let provider = MockProvider::working();
    let (job, report) = run_job(LITERAL_TAGS_HTML, &provider, memory_ledger(), fast_config())
        .await
        .unwrap();

    assert_eq!(report.status, JobStatus::Completed);
    let title = job
        .units()
        .iter()
        .find(|u| u.raw_text_element.is_some())
        .unwrap();
    assert_eq!(title.source_text, "Use <b> for bold");
    assert!(!title.has_placeholders());
    assert_eq!(job.reassemble().unwrap().to_html(), LITERAL_TAGS_HTML);
}

#[tokio::test]
async fn test_pipeline_withRejectedCredentials_shouldFailWithoutRetrying() {
    let provider = MockProvider::rejecting();
    let (_, report) = run_job(SAMPLE_HTML, &provider, memory_ledger(), fast_config())
        .await
        .unwrap();

    assert_eq!(report.failed_permanent, report.total_units);
    assert!(report.failures.iter().all(|f| f.attempt_count == 1));
    assert_eq!(provider.request_count(), report.total_units);
}

#[tokio::test]
async fn test_pipeline_withIntermittentFailures_shouldRecoverThroughRetries() {
    let mut config = fast_config();
    config.retry.max_attempts = 6;
    config.scheduler.max_concurrent_requests = 1;
    let provider = MockProvider::intermittent(3);
    let (_, report) = run_job(SAMPLE_HTML, &provider, memory_ledger(), config).await.unwrap();

    assert_eq!(report.status, JobStatus::Completed);
    assert!(report.total_attempts > report.total_units as u64);
    assert_eq!(provider.request_count() as u64, report.total_attempts);
}

#[tokio::test]
async fn test_pipeline_withConcurrentDispatch_shouldNeverOverlapOneUnit() {
    let html = long_document(60);
    let mut config = fast_config();
    config.chunker.max_unit_chars = 200;
    config.scheduler.max_concurrent_requests = 4;

    let provider = MockProvider::slow(15);
    let (job, report) = run_job(&html, &provider, memory_ledger(), config).await.unwrap();

    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(provider.overlapping_requests(), 0);
    assert!(provider.peak_concurrency() <= 4);
    assert!(provider.peak_concurrency() > 1);
    assert_eq!(provider.request_count(), job.units().len());
}

#[tokio::test]
async fn test_pipeline_withCancellationBeforeStart_shouldLeaveUnitsPending() {
    let cancel = CancellationFlag::new();
    cancel.cancel();
    let provider = MockProvider::working();
    let (job, report) = common::run_job_with_cancel(SAMPLE_HTML, &provider, memory_ledger(), fast_config(), cancel)
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.status, JobStatus::Cancelled);
    assert_eq!(report.pending, report.total_units);
    assert_eq!(provider.request_count(), 0);
    assert!(job.units().iter().all(|u| u.status == UnitStatus::Pending));
    assert!(matches!(
        job.reassemble(),
        Err(JobError::Reassemble(ReassembleError::IncompleteJob { .. }))
    ));
}

#[tokio::test]
async fn test_pipeline_withFailureBudget_shouldStopDispatching() {
    let mut config = fast_config();
    config.scheduler.max_concurrent_requests = 1;
    config.scheduler.max_permanent_failures = Some(1);
    let provider = MockProvider::rejecting();
    let (_, report) = run_job(SAMPLE_HTML, &provider, memory_ledger(), config).await.unwrap();

    assert!(report.cancelled);
    assert_eq!(report.failed_permanent, 1);
    assert_eq!(report.pending, report.total_units - 1);
    assert_eq!(report.status, JobStatus::Cancelled);
}

#[tokio::test]
async fn test_prepare_withMalformedDocument_shouldFailBeforeDispatch() {
    let provider = MockProvider::working();
    let result = run_job("<html lang=\"en\"><body><div>Open</body></html>", &provider, memory_ledger(), fast_config()).await;

    let error = result.err().unwrap();
    assert!(matches!(error.downcast_ref::<JobError>(), Some(JobError::Parse(_))));
    assert_eq!(provider.request_count(), 0);
}

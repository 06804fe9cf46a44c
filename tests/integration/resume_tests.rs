/*!
 * Integration tests for resuming jobs from the ledger
 */

use std::sync::Arc;

use yahtwai::ledger::{JobStatus, LedgerStore, SqliteLedger};
use yahtwai::providers::mock::MockProvider;
use yahtwai::translation::job::job_id;
use yahtwai::translation::{Job, JobInput, UnitStatus};

use crate::common::{self, fast_config, memory_ledger, run_job, to_french, SAMPLE_HTML};

#[tokio::test]
async fn test_resume_afterCompletedRun_shouldMakeNoCalls() {
    let ledger = memory_ledger();
    let first_provider = MockProvider::working().with_custom_response(to_french);
    let (first_job, first) = run_job(SAMPLE_HTML, &first_provider, Arc::clone(&ledger), fast_config())
        .await
        .unwrap();
    assert_eq!(first.status, JobStatus::Completed);

    let second_provider = MockProvider::working();
    let (second_job, second) = run_job(SAMPLE_HTML, &second_provider, ledger, fast_config())
        .await
        .unwrap();

    assert_eq!(second_provider.request_count(), 0);
    assert_eq!(second.translation_calls, 0);
    assert_eq!(second.resumed_units, second.total_units);
    assert_eq!(second.job_id, first.job_id);
    assert_ne!(second.run_id, first.run_id);
    assert_eq!(
        second_job.reassemble().unwrap().to_html(),
        first_job.reassemble().unwrap().to_html()
    );
}

#[tokio::test]
async fn test_resume_afterPartialRun_shouldRetryOnlyFailedUnits() {
    let ledger = memory_ledger();
    let (_, first) = run_job(SAMPLE_HTML, &MockProvider::drop_tags(), Arc::clone(&ledger), fast_config())
        .await
        .unwrap();
    assert_eq!(first.status, JobStatus::Partial);

    let provider = MockProvider::working();
    let (job, second) = run_job(SAMPLE_HTML, &provider, ledger, fast_config()).await.unwrap();

    assert_eq!(second.status, JobStatus::Completed);
    assert_eq!(provider.request_count(), first.failed_permanent);
    assert_eq!(second.resumed_units, first.validated);
    assert_eq!(job.reassemble().unwrap().to_html(), SAMPLE_HTML);
}

#[tokio::test]
async fn test_resume_withoutRetryingFailures_shouldKeepThemFailed() {
    let ledger = memory_ledger();
    let (_, first) = run_job(SAMPLE_HTML, &MockProvider::failing(), Arc::clone(&ledger), fast_config())
        .await
        .unwrap();

    let mut config = fast_config();
    config.retry_failed_on_resume = false;
    let provider = MockProvider::working();
    let (job, second) = run_job(SAMPLE_HTML, &provider, ledger, config).await.unwrap();

    assert_eq!(provider.request_count(), 0);
    assert_eq!(second.status, JobStatus::Partial);
    assert_eq!(second.failures.len(), first.failures.len());
    assert!(second.failures.iter().all(|f| f.attempt_count == 3));
    assert!(job.units().iter().all(|u| u.status == UnitStatus::FailedPermanent));
}

#[tokio::test]
async fn test_resume_withUnitLeftInFlight_shouldReleaseAndTranslateIt() {
    let ledger = memory_ledger();
    let input = JobInput {
        document_key: "book/chapter1.html",
        html: SAMPLE_HTML,
        target_language: "fr",
        provider: "mock",
        model: "mock",
    };
    let crashed = Job::prepare(input, fast_config(), Arc::clone(&ledger)).await.unwrap();
    let id = job_id("book/chapter1.html", "fr");
    assert_eq!(crashed.id(), id);
    let stuck = crashed.units()[2].id.clone();
    assert_eq!(ledger.begin_attempt(&id, &stuck).await.unwrap(), Some(1));
    drop(crashed);

    let provider = MockProvider::working();
    let (job, report) = run_job(SAMPLE_HTML, &provider, Arc::clone(&ledger), fast_config())
        .await
        .unwrap();

    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(provider.request_count(), report.total_units);
    let unit = job.units().iter().find(|u| u.id == stuck).unwrap();
    assert_eq!(unit.attempt_count, 2);
    assert_eq!(ledger.counts(&id).await.unwrap().validated, report.total_units);
}

#[tokio::test]
async fn test_resume_withEditedParagraph_shouldTranslateOnlyNewUnit() {
    let ledger = memory_ledger();
    run_job(SAMPLE_HTML, &MockProvider::working(), Arc::clone(&ledger), fast_config())
        .await
        .unwrap();

    let edited = SAMPLE_HTML.replace("for details", "for more details");
    let provider = MockProvider::working();
    let (job, report) = run_job(&edited, &provider, ledger, fast_config()).await.unwrap();

    assert_eq!(provider.request_count(), 1);
    assert_eq!(report.resumed_units, report.total_units - 1);
    assert_eq!(job.reassemble().unwrap().to_html(), edited);
}

#[tokio::test]
async fn test_resume_withLedgerOnDisk_shouldSurviveReopen() {
    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("ledger.db");

    {
        let ledger: Arc<dyn LedgerStore> = Arc::new(SqliteLedger::open(&path).unwrap());
        run_job(SAMPLE_HTML, &MockProvider::working(), ledger, fast_config())
            .await
            .unwrap();
    }

    let reopened: Arc<dyn LedgerStore> = Arc::new(SqliteLedger::open(&path).unwrap());
    let provider = MockProvider::working();
    let (_, report) = run_job(SAMPLE_HTML, &provider, Arc::clone(&reopened), fast_config())
        .await
        .unwrap();

    assert_eq!(provider.request_count(), 0);
    assert_eq!(report.status, JobStatus::Completed);
    let jobs = reopened.list_jobs().await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, JobStatus::Completed);
}

fn fail_notes(text: &str) -> String {
    if text.contains("notes") {
        String::new()
    } else {
        text.to_string()
    }
}

#[tokio::test]
async fn test_resume_withEditedFailedParagraph_shouldCountOnlyCurrentUnits() {
    let ledger = memory_ledger();
    let provider = MockProvider::working().with_custom_response(fail_notes);
    let (_, first) = run_job(SAMPLE_HTML, &provider, Arc::clone(&ledger), fast_config())
        .await
        .unwrap();
    assert_eq!(first.failed_permanent, 1);
    assert_eq!(first.total_attempts, (first.total_units + 2) as u64);

    let edited = SAMPLE_HTML.replace("for details", "for more details");
    let provider = MockProvider::working().with_custom_response(fail_notes);
    let (job, second) = run_job(&edited, &provider, Arc::clone(&ledger), fast_config())
        .await
        .unwrap();

    assert_eq!(provider.request_count(), 3);
    assert_eq!(second.total_units, first.total_units);
    assert_eq!(second.total_attempts, (second.total_units + 2) as u64);

    let counts = ledger.counts(job.id()).await.unwrap();
    assert_eq!(counts.validated, second.total_units - 1);
    assert_eq!(counts.failed_permanent, 1);
    assert_eq!(counts.pending + counts.in_flight, 0);
    assert_eq!(ledger.load(job.id()).await.unwrap().len(), second.total_units);
}

#[tokio::test]
async fn test_resume_withFinalAttemptInterrupted_shouldNotCallAgain() {
    let ledger = memory_ledger();
    let input = JobInput {
        document_key: "book/chapter1.html",
        html: SAMPLE_HTML,
        target_language: "fr",
        provider: "mock",
        model: "mock",
    };
    let crashed = Job::prepare(input, fast_config(), Arc::clone(&ledger)).await.unwrap();
    let id = crashed.id().to_string();
    let stuck = crashed.units()[0].id.clone();
    drop(crashed);
    for attempt in 1..=3 {
        assert_eq!(ledger.begin_attempt(&id, &stuck).await.unwrap(), Some(attempt));
        if attempt < 3 {
            ledger.release_in_flight(&id, 3).await.unwrap();
        }
    }

    let mut config = fast_config();
    config.retry_failed_on_resume = false;
    let provider = MockProvider::working();
    let (job, report) = run_job(SAMPLE_HTML, &provider, Arc::clone(&ledger), config)
        .await
        .unwrap();

    assert_eq!(provider.request_count(), report.total_units - 1);
    assert_eq!(report.status, JobStatus::Partial);
    let unit = job.units().iter().find(|u| u.id == stuck).unwrap();
    assert_eq!(unit.status, UnitStatus::FailedPermanent);
    assert_eq!(unit.attempt_count, 3);
    assert!(unit.failure_reason.as_deref().unwrap_or_default().starts_with("interrupted: "));
}

/*!
 * Tests for the SQLite ledger: claiming, release and reset of unit entries
 */

use std::sync::Arc;

use yahtwai::document::parse_document;
use yahtwai::ledger::{JobRecord, JobStatus, LedgerEntry, LedgerStore, SqliteLedger};
use yahtwai::translation::{chunk, ChunkerConfig, Unit, UnitStatus};

use crate::common::SAMPLE_HTML;

fn sample_units() -> Vec<Unit> {
    let document = Arc::new(parse_document(SAMPLE_HTML).unwrap());
    chunk(document, &ChunkerConfig::default()).units
}

async fn registered_ledger(units: &[Unit]) -> SqliteLedger {
    let ledger = SqliteLedger::in_memory().unwrap();
    let job = JobRecord::new(
        "job-1".into(),
        "chapter1.html".into(),
        "hash".into(),
        "en".into(),
        "fr".into(),
        "mock".into(),
        "mock".into(),
        units.len() as i64,
    );
    ledger.register_job(&job).await.unwrap();
    ledger.seed("job-1", units).await.unwrap();
    ledger
}

#[test]
fn test_seed_shouldBeIdempotent() {
    let units = sample_units();
    let counts = tokio_test::block_on(async {
        let ledger = registered_ledger(&units).await;
        assert_eq!(ledger.seed("job-1", &units).await.unwrap(), 0);
        ledger.counts("job-1").await.unwrap()
    });

    assert_eq!(counts.pending, units.len());
    assert_eq!(counts.total(), units.len());
}

#[tokio::test]
async fn test_beginAttempt_shouldClaimOnlyPendingUnits() {
    let units = sample_units();
    let ledger = registered_ledger(&units).await;
    let id = &units[0].id;

    assert_eq!(ledger.begin_attempt("job-1", id).await.unwrap(), Some(1));
    assert_eq!(ledger.begin_attempt("job-1", id).await.unwrap(), None);
    assert_eq!(ledger.counts("job-1").await.unwrap().in_flight, 1);

    let mut entry = LedgerEntry::pending("job-1", id, 0);
    entry.attempt_count = 1;
    entry.failure_reason = Some("placeholder-mismatch".into());
    ledger.record(&entry).await.unwrap();
    assert_eq!(ledger.begin_attempt("job-1", id).await.unwrap(), Some(2));
}

#[tokio::test]
async fn test_releaseInFlight_shouldReturnClaimedUnitsToPending() {
    let units = sample_units();
    let ledger = registered_ledger(&units).await;
    ledger.begin_attempt("job-1", &units[0].id).await.unwrap();
    ledger.begin_attempt("job-1", &units[1].id).await.unwrap();

    assert_eq!(ledger.release_in_flight("job-1", 3).await.unwrap(), (2, 0));
    let entries = ledger.load("job-1").await.unwrap();
    assert_eq!(entries[&units[0].id].status, UnitStatus::Pending);
    assert_eq!(entries[&units[0].id].attempt_count, 1);
}

#[tokio::test]
async fn test_resetFailed_shouldClearAttemptsAndReason() {
    let units = sample_units();
    let ledger = registered_ledger(&units).await;

    let mut entry = LedgerEntry::pending("job-1", &units[0].id, 0);
    entry.status = UnitStatus::FailedPermanent;
    entry.attempt_count = 4;
    entry.failure_reason = Some("provider-error: 500".into());
    ledger.record(&entry).await.unwrap();

    assert_eq!(ledger.reset_failed("job-1").await.unwrap(), 1);
    let reset = &ledger.load("job-1").await.unwrap()[&units[0].id];
    assert_eq!(reset.status, UnitStatus::Pending);
    assert_eq!(reset.attempt_count, 0);
    assert!(reset.failure_reason.is_none());
}

#[tokio::test]
async fn test_listJobs_shouldReflectStatusUpdates() {
    let units = sample_units();
    let ledger = registered_ledger(&units).await;
    ledger.update_job_status("job-1", JobStatus::Partial).await.unwrap();

    let jobs = ledger.list_jobs().await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, JobStatus::Partial);
    assert_eq!(jobs[0].total_units, units.len() as i64);
}

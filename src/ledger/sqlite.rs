/*!
 * SQLite-backed ledger.
 */

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

use super::{JobRecord, JobStatus, LedgerEntry, LedgerStore, UnitCounts};
use crate::database::{DatabaseConnection, Repository};
use crate::translation::unit::{Unit, UnitStatus};

/// Ledger stored in a SQLite database
#[derive(Clone)]
pub struct SqliteLedger {
    repository: Repository,
}

impl SqliteLedger {
    /// Open or create the ledger database at a path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(Repository::new(DatabaseConnection::new(path)?)))
    }

    /// Open the ledger at the default location
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(Repository::new_default()?))
    }

    /// In-memory ledger (for testing)
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(Repository::new_in_memory()?))
    }

    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }
}

#[async_trait]
impl LedgerStore for SqliteLedger {
    async fn register_job(&self, job: &JobRecord) -> Result<()> {
        self.repository.upsert_job(job).await
    }

    async fn list_jobs(&self) -> Result<Vec<JobRecord>> {
        self.repository.list_jobs().await
    }

    async fn update_job_status(&self, job_id: &str, status: JobStatus) -> Result<()> {
        self.repository.update_job_status(job_id, status).await
    }

    async fn seed(&self, job_id: &str, units: &[Unit]) -> Result<usize> {
        let ids = units.iter().map(|u| (u.id.clone(), u.index)).collect();
        self.repository.seed_entries(job_id, ids).await
    }

    async fn load(&self, job_id: &str) -> Result<HashMap<String, LedgerEntry>> {
        let entries = self.repository.load_entries(job_id).await?;
        Ok(entries.into_iter().map(|e| (e.unit_id.clone(), e)).collect())
    }

    async fn record(&self, entry: &LedgerEntry) -> Result<()> {
        self.repository.upsert_entry(entry).await
    }

    async fn is_done(&self, job_id: &str, unit_id: &str) -> Result<bool> {
        let entry = self.repository.get_entry(job_id, unit_id).await?;
        Ok(entry.is_some_and(|e| e.status == UnitStatus::Validated))
    }

    async fn begin_attempt(&self, job_id: &str, unit_id: &str) -> Result<Option<u32>> {
        self.repository.claim_entry(job_id, unit_id).await
    }

    async fn retain(&self, job_id: &str, units: &[Unit]) -> Result<usize> {
        let keep = units.iter().map(|u| u.id.clone()).collect();
        self.repository.prune_entries(job_id, keep).await
    }

    async fn release_in_flight(&self, job_id: &str, max_attempts: u32) -> Result<(usize, usize)> {
        self.repository.release_in_flight(job_id, max_attempts).await
    }

    async fn reset_failed(&self, job_id: &str) -> Result<usize> {
        self.repository.reset_failed(job_id).await
    }

    async fn counts(&self, job_id: &str) -> Result<UnitCounts> {
        self.repository.count_entries(job_id).await
    }

    async fn total_attempts(&self, job_id: &str) -> Result<u64> {
        self.repository.total_attempts(job_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::unit::{UnitKind, UnitPosition};

    fn unit(index: usize, text: &str) -> Unit {
        let position = UnitPosition {
            path: format!("/p[{}]#r0#f0", index),
            run: index,
            fragment_index: 0,
            fragment_count: 1,
            start: 0,
            end: text.len(),
            leading_ws: String::new(),
            trailing_ws: String::new(),
        };
        Unit::new(index, UnitKind::Atomic, text.to_string(), position, text)
    }

    async fn ledger() -> SqliteLedger {
        let ledger = SqliteLedger::in_memory().unwrap();
        let job = JobRecord::new(
            "job".into(),
            "doc.html".into(),
            "hash".into(),
            "he".into(),
            "en".into(),
            "mock".into(),
            "mock".into(),
            2,
        );
        ledger.register_job(&job).await.unwrap();
        ledger
    }

    #[tokio::test]
    async fn test_isDone_shouldReflectValidatedEntries() {
        let ledger = ledger().await;
        let units = vec![unit(0, "one"), unit(1, "two")];
        assert_eq!(ledger.seed("job", &units).await.unwrap(), 2);
        assert!(!ledger.is_done("job", &units[0].id).await.unwrap());

        let mut entry = LedgerEntry::pending("job", &units[0].id, 0);
        entry.status = UnitStatus::Validated;
        entry.attempt_count = 1;
        entry.translated_text = Some("un".into());
        ledger.record(&entry).await.unwrap();

        assert!(ledger.is_done("job", &units[0].id).await.unwrap());
        let loaded = ledger.load("job").await.unwrap();
        assert_eq!(loaded[&units[0].id].translated_text.as_deref(), Some("un"));
        assert_eq!(ledger.counts("job").await.unwrap().validated, 1);
    }

    #[tokio::test]
    async fn test_open_shouldPersistAcrossConnections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let units = vec![unit(0, "one")];
        {
            let ledger = SqliteLedger::open(&path).unwrap();
            let job = JobRecord::new(
                "job".into(),
                "doc.html".into(),
                "hash".into(),
                "he".into(),
                "en".into(),
                "mock".into(),
                "mock".into(),
                1,
            );
            ledger.register_job(&job).await.unwrap();
            ledger.seed("job", &units).await.unwrap();
            ledger.begin_attempt("job", &units[0].id).await.unwrap();
        }
        let reopened = SqliteLedger::open(&path).unwrap();
        assert_eq!(reopened.release_in_flight("job", 3).await.unwrap(), (1, 0));
        assert_eq!(reopened.total_attempts("job").await.unwrap(), 1);
    }
}

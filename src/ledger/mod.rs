/*!
 * Recovery and resume ledger.
 *
 * The ledger is the durable record of every unit's status. A job seeds it
 * with pending entries, claims units before translating them, and records
 * every outcome, so an interrupted job resumes exactly where it stopped and
 * validated units are never translated twice.
 */

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

pub mod sqlite;

pub use crate::database::models::{JobRecord, JobStatus, LedgerEntry, UnitCounts};
pub use sqlite::SqliteLedger;

use crate::translation::unit::Unit;

/// Durable per-unit translation state
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Create or refresh the job record
    async fn register_job(&self, job: &JobRecord) -> Result<()>;

    /// Every known job, most recently updated first
    async fn list_jobs(&self) -> Result<Vec<JobRecord>>;

    /// Set the status of a job
    async fn update_job_status(&self, job_id: &str, status: JobStatus) -> Result<()>;

    /// Insert a pending entry for every unit not yet known; returns how many were new
    async fn seed(&self, job_id: &str, units: &[Unit]) -> Result<usize>;

    /// All entries of a job, keyed by unit id
    async fn load(&self, job_id: &str) -> Result<HashMap<String, LedgerEntry>>;

    /// Durably upsert an entry
    async fn record(&self, entry: &LedgerEntry) -> Result<()>;

    /// Whether a unit is validated
    async fn is_done(&self, job_id: &str, unit_id: &str) -> Result<bool>;

    /// Claim a pending unit for one attempt.
    ///
    /// Returns the attempt number, or `None` when the unit is not pending.
    async fn begin_attempt(&self, job_id: &str, unit_id: &str) -> Result<Option<u32>>;

    /// Drop entries of units the document no longer has; returns how many went
    async fn retain(&self, job_id: &str, units: &[Unit]) -> Result<usize>;

    /// Return in-flight units of an interrupted run to pending.
    ///
    /// Units already at `max_attempts` fail for good instead. Returns
    /// `(released, exhausted)`.
    async fn release_in_flight(&self, job_id: &str, max_attempts: u32) -> Result<(usize, usize)>;

    /// Return permanently failed units to pending with no attempts
    async fn reset_failed(&self, job_id: &str) -> Result<usize>;

    /// Unit counts per status
    async fn counts(&self, job_id: &str) -> Result<UnitCounts>;

    /// Attempts made over the whole life of the job
    async fn total_attempts(&self, job_id: &str) -> Result<u64>;
}

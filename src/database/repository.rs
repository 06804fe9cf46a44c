/*!
 * Repository layer for ledger operations.
 *
 * Every unit status transition is a single SQL statement keyed by
 * `(job_id, unit_id)`, so concurrent attempts can never both claim a unit.
 */

use std::collections::HashSet;

use anyhow::Result;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::connection::DatabaseConnection;
use super::models::{JobRecord, JobStatus, LedgerEntry, UnitCounts};
use crate::translation::unit::UnitStatus;

const JOB_COLUMNS: &str = "id, document_key, source_hash, source_language, target_language, \
     provider, model, total_units, status, created_at, updated_at, completed_at";

/// Failure reason for a unit whose last attempt never reported back
pub const INTERRUPTED_FINAL_ATTEMPT: &str = "interrupted: final attempt did not finish";

const ENTRY_COLUMNS: &str =
    "job_id, unit_id, unit_index, status, attempt_count, translated_text, failure_reason, updated_at";

/// Repository for ledger operations
#[derive(Clone)]
pub struct Repository {
    db: DatabaseConnection,
}

impl Repository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with the default database location
    pub fn new_default() -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new_default()?))
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new_in_memory()?))
    }

    /// Underlying connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    fn job_from_row(row: &Row<'_>) -> rusqlite::Result<JobRecord> {
        Ok(JobRecord {
            id: row.get(0)?,
            document_key: row.get(1)?,
            source_hash: row.get(2)?,
            source_language: row.get(3)?,
            target_language: row.get(4)?,
            provider: row.get(5)?,
            model: row.get(6)?,
            total_units: row.get(7)?,
            status: row
                .get::<_, String>(8)?
                .parse()
                .unwrap_or(JobStatus::InProgress),
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
            completed_at: row.get(11)?,
        })
    }

    fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<LedgerEntry> {
        Ok(LedgerEntry {
            job_id: row.get(0)?,
            unit_id: row.get(1)?,
            unit_index: row.get(2)?,
            status: row
                .get::<_, String>(3)?
                .parse()
                .unwrap_or(UnitStatus::Pending),
            attempt_count: row.get(4)?,
            translated_text: row.get(5)?,
            failure_reason: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    // =========================================================================
    // Job Operations
    // =========================================================================

    /// Insert a job, or refresh an existing one and mark it in progress again
    pub async fn upsert_job(&self, job: &JobRecord) -> Result<()> {
        let job = job.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO jobs (
                        id, document_key, source_hash, source_language, target_language,
                        provider, model, total_units, status, created_at, updated_at, completed_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                    ON CONFLICT(id) DO UPDATE SET
                        source_hash = excluded.source_hash,
                        source_language = excluded.source_language,
                        provider = excluded.provider,
                        model = excluded.model,
                        total_units = excluded.total_units,
                        status = excluded.status,
                        updated_at = excluded.updated_at,
                        completed_at = NULL
                    "#,
                    params![
                        job.id,
                        job.document_key,
                        job.source_hash,
                        job.source_language,
                        job.target_language,
                        job.provider,
                        job.model,
                        job.total_units,
                        job.status.to_string(),
                        job.created_at,
                        job.updated_at,
                        job.completed_at,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Get a job by id
    pub async fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>> {
        let job_id = job_id.to_string();

        self.db
            .execute_async(move |conn| {
                let sql = format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS);
                Ok(conn.query_row(&sql, [&job_id], Self::job_from_row).optional()?)
            })
            .await
    }

    /// All jobs, most recently updated first
    pub async fn list_jobs(&self) -> Result<Vec<JobRecord>> {
        self.db
            .execute_async(|conn| {
                let sql = format!("SELECT {} FROM jobs ORDER BY updated_at DESC", JOB_COLUMNS);
                let mut stmt = conn.prepare(&sql)?;
                let jobs = stmt
                    .query_map([], Self::job_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(jobs)
            })
            .await
    }

    /// Update the status of a job
    pub async fn update_job_status(&self, job_id: &str, status: JobStatus) -> Result<()> {
        let job_id = job_id.to_string();

        self.db
            .execute_async(move |conn| {
                let now = chrono::Utc::now().to_rfc3339();
                let completed_at = match status {
                    JobStatus::Completed | JobStatus::Partial => Some(now.clone()),
                    JobStatus::InProgress | JobStatus::Cancelled => None,
                };
                conn.execute(
                    "UPDATE jobs SET status = ?1, updated_at = ?2, completed_at = ?3 WHERE id = ?4",
                    params![status.to_string(), now, completed_at, job_id],
                )?;
                Ok(())
            })
            .await
    }

    // =========================================================================
    // Unit Entry Operations
    // =========================================================================

    /// Insert pending entries for units not seen before; returns how many were new
    pub async fn seed_entries(&self, job_id: &str, units: Vec<(String, usize)>) -> Result<usize> {
        let job_id = job_id.to_string();

        self.db
            .transaction_async(move |tx| {
                let now = chrono::Utc::now().to_rfc3339();
                let mut stmt = tx.prepare(
                    r#"
                    INSERT INTO unit_entries (job_id, unit_id, unit_index, status, attempt_count, updated_at)
                    VALUES (?1, ?2, ?3, 'pending', 0, ?4)
                    ON CONFLICT(job_id, unit_id) DO NOTHING
                    "#,
                )?;
                let mut inserted = 0;
                for (unit_id, index) in &units {
                    let index = *index as i64;
                    inserted += stmt.execute(params![job_id, unit_id, index, now])?;
                }
                debug!("Seeded {} new ledger entries for job {}", inserted, job_id);
                Ok(inserted)
            })
            .await
    }

    /// Delete entries whose unit is not in `keep`; returns how many went
    pub async fn prune_entries(&self, job_id: &str, keep: Vec<String>) -> Result<usize> {
        let job_id = job_id.to_string();

        self.db
            .transaction_async(move |tx| {
                let keep: HashSet<String> = keep.into_iter().collect();
                let stale: Vec<String> = {
                    let mut stmt = tx.prepare("SELECT unit_id FROM unit_entries WHERE job_id = ?1")?;
                    let ids = stmt
                        .query_map([&job_id], |row| row.get::<_, String>(0))?
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    ids.into_iter().filter(|id| !keep.contains(id)).collect()
                };

                let mut delete = tx.prepare("DELETE FROM unit_entries WHERE job_id = ?1 AND unit_id = ?2")?;
                let mut pruned = 0;
                for unit_id in &stale {
                    pruned += delete.execute(params![job_id, unit_id])?;
                }
                debug!("Pruned {} stale ledger entries for job {}", pruned, job_id);
                Ok(pruned)
            })
            .await
    }

    /// All entries of a job, in unit order
    pub async fn load_entries(&self, job_id: &str) -> Result<Vec<LedgerEntry>> {
        let job_id = job_id.to_string();

        self.db
            .execute_async(move |conn| {
                let sql = format!(
                    "SELECT {} FROM unit_entries WHERE job_id = ?1 ORDER BY unit_index",
                    ENTRY_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let entries = stmt
                    .query_map([&job_id], Self::entry_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(entries)
            })
            .await
    }

    /// Get one entry
    pub async fn get_entry(&self, job_id: &str, unit_id: &str) -> Result<Option<LedgerEntry>> {
        let job_id = job_id.to_string();
        let unit_id = unit_id.to_string();

        self.db
            .execute_async(move |conn| Self::get_entry_sync(conn, &job_id, &unit_id))
            .await
    }

    fn get_entry_sync(conn: &Connection, job_id: &str, unit_id: &str) -> Result<Option<LedgerEntry>> {
        let sql = format!(
            "SELECT {} FROM unit_entries WHERE job_id = ?1 AND unit_id = ?2",
            ENTRY_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![job_id, unit_id], Self::entry_from_row)
            .optional()?)
    }

    /// Insert or replace an entry
    pub async fn upsert_entry(&self, entry: &LedgerEntry) -> Result<()> {
        let entry = entry.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO unit_entries (
                        job_id, unit_id, unit_index, status, attempt_count,
                        translated_text, failure_reason, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(job_id, unit_id) DO UPDATE SET
                        unit_index = excluded.unit_index,
                        status = excluded.status,
                        attempt_count = excluded.attempt_count,
                        translated_text = excluded.translated_text,
                        failure_reason = excluded.failure_reason,
                        updated_at = excluded.updated_at
                    "#,
                    params![
                        entry.job_id,
                        entry.unit_id,
                        entry.unit_index,
                        entry.status.to_string(),
                        entry.attempt_count,
                        entry.translated_text,
                        entry.failure_reason,
                        entry.updated_at,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Move a pending unit to in-flight and count the attempt.
    ///
    /// Returns the new attempt count, or `None` when the unit was not pending.
    pub async fn claim_entry(&self, job_id: &str, unit_id: &str) -> Result<Option<u32>> {
        let job_id = job_id.to_string();
        let unit_id = unit_id.to_string();

        self.db
            .transaction_async(move |tx| {
                let claimed = tx.execute(
                    r#"
                    UPDATE unit_entries
                    SET status = 'in_flight', attempt_count = attempt_count + 1, updated_at = ?3
                    WHERE job_id = ?1 AND unit_id = ?2 AND status = 'pending'
                    "#,
                    params![job_id, unit_id, chrono::Utc::now().to_rfc3339()],
                )?;
                if claimed == 0 {
                    return Ok(None);
                }
                let attempts: u32 = tx.query_row(
                    "SELECT attempt_count FROM unit_entries WHERE job_id = ?1 AND unit_id = ?2",
                    params![job_id, unit_id],
                    |row| row.get(0),
                )?;
                Ok(Some(attempts))
            })
            .await
    }

    /// Reset in-flight entries left behind by an interrupted run.
    ///
    /// Entries already at `max_attempts` have no attempt left and fail for
    /// good instead. Returns `(released, exhausted)`.
    pub async fn release_in_flight(&self, job_id: &str, max_attempts: u32) -> Result<(usize, usize)> {
        let job_id = job_id.to_string();

        self.db
            .transaction_async(move |tx| {
                let now = chrono::Utc::now().to_rfc3339();
                let exhausted = tx.execute(
                    r#"
                    UPDATE unit_entries
                    SET status = 'failed_permanent', failure_reason = ?3, updated_at = ?4
                    WHERE job_id = ?1 AND status = 'in_flight' AND attempt_count >= ?2
                    "#,
                    params![job_id, max_attempts, INTERRUPTED_FINAL_ATTEMPT, now],
                )?;
                let released = tx.execute(
                    "UPDATE unit_entries SET status = 'pending', updated_at = ?2 WHERE job_id = ?1 AND status = 'in_flight'",
                    params![job_id, now],
                )?;
                Ok((released, exhausted))
            })
            .await
    }

    /// Give permanently failed entries a fresh set of attempts
    pub async fn reset_failed(&self, job_id: &str) -> Result<usize> {
        let job_id = job_id.to_string();

        self.db
            .execute_async(move |conn| {
                let reset = conn.execute(
                    r#"
                    UPDATE unit_entries
                    SET status = 'pending', attempt_count = 0, failure_reason = NULL, updated_at = ?2
                    WHERE job_id = ?1 AND status = 'failed_permanent'
                    "#,
                    params![job_id, chrono::Utc::now().to_rfc3339()],
                )?;
                Ok(reset)
            })
            .await
    }

    /// Number of entries per status
    pub async fn count_entries(&self, job_id: &str) -> Result<UnitCounts> {
        let job_id = job_id.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT status, COUNT(*) FROM unit_entries WHERE job_id = ?1 GROUP BY status",
                )?;
                let rows = stmt
                    .query_map([&job_id], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                let mut counts = UnitCounts::default();
                for (status, count) in rows {
                    counts.add(status.parse()?, count as usize);
                }
                Ok(counts)
            })
            .await
    }

    /// Sum of attempts over all entries of a job
    pub async fn total_attempts(&self, job_id: &str) -> Result<u64> {
        let job_id = job_id.to_string();

        self.db
            .execute_async(move |conn| {
                let total: i64 = conn.query_row(
                    "SELECT COALESCE(SUM(attempt_count), 0) FROM unit_entries WHERE job_id = ?1",
                    [&job_id],
                    |row| row.get(0),
                )?;
                Ok(total as u64)
            })
            .await
    }
}

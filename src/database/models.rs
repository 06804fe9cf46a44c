/*!
 * Database entity models.
 *
 * These structures map directly to the `jobs` and `unit_entries` tables.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::translation::unit::UnitStatus;

/// Job status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Units are still being translated
    InProgress,
    /// Every unit validated
    Completed,
    /// Finished with some units failed permanently
    Partial,
    /// Stopped before every unit was terminal
    Cancelled,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::InProgress => write!(f, "in_progress"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Partial => write!(f, "partial"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_progress" => Ok(JobStatus::InProgress),
            "completed" => Ok(JobStatus::Completed),
            "partial" => Ok(JobStatus::Partial),
            "cancelled" => Ok(JobStatus::Cancelled),
            _ => Err(anyhow::anyhow!("Invalid job status: {}", s)),
        }
    }
}

/// Translation job record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job id derived from document key and target language
    pub id: String,
    /// Stable document key, usually the path relative to the input root
    pub document_key: String,
    /// SHA256 of the source document
    pub source_hash: String,
    /// Source language code
    pub source_language: String,
    /// Target language code
    pub target_language: String,
    /// Translation provider used
    pub provider: String,
    /// Model used for translation
    pub model: String,
    /// Number of units in the document
    pub total_units: i64,
    /// Current job status
    pub status: JobStatus,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
    /// Last update timestamp (RFC 3339)
    pub updated_at: String,
    /// Completion timestamp (RFC 3339), once finished
    pub completed_at: Option<String>,
}

impl JobRecord {
    /// Create a new in-progress job record
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        document_key: String,
        source_hash: String,
        source_language: String,
        target_language: String,
        provider: String,
        model: String,
        total_units: i64,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id,
            document_key,
            source_hash,
            source_language,
            target_language,
            provider,
            model,
            total_units,
            status: JobStatus::InProgress,
            created_at: now.clone(),
            updated_at: now,
            completed_at: None,
        }
    }

    /// Whether the job may have work left
    pub fn is_resumable(&self) -> bool {
        matches!(self.status, JobStatus::InProgress | JobStatus::Cancelled | JobStatus::Partial)
    }
}

/// Persisted status of one unit of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Owning job
    pub job_id: String,
    /// Unit id
    pub unit_id: String,
    /// Position of the unit in the chunk sequence
    pub unit_index: i64,
    /// Current status
    pub status: UnitStatus,
    /// Attempts made so far, across runs
    pub attempt_count: u32,
    /// Accepted translation
    pub translated_text: Option<String>,
    /// Reason of the last failure
    pub failure_reason: Option<String>,
    /// Last update timestamp (RFC 3339)
    pub updated_at: String,
}

impl LedgerEntry {
    /// A fresh pending entry
    pub fn pending(job_id: &str, unit_id: &str, unit_index: usize) -> Self {
        Self {
            job_id: job_id.to_string(),
            unit_id: unit_id.to_string(),
            unit_index: unit_index as i64,
            status: UnitStatus::Pending,
            attempt_count: 0,
            translated_text: None,
            failure_reason: None,
            updated_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Whether no further attempts will be made
    pub fn is_done(&self) -> bool {
        self.status == UnitStatus::Validated
    }
}

/// Unit counts of a job per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitCounts {
    pub pending: usize,
    pub in_flight: usize,
    pub validated: usize,
    pub failed_permanent: usize,
}

impl UnitCounts {
    pub fn total(&self) -> usize {
        self.pending + self.in_flight + self.validated + self.failed_permanent
    }

    /// Add one unit of the given status
    pub fn add(&mut self, status: UnitStatus, count: usize) {
        match status {
            UnitStatus::Pending => self.pending += count,
            UnitStatus::InFlight => self.in_flight += count,
            UnitStatus::Validated => self.validated += count,
            UnitStatus::FailedPermanent => self.failed_permanent += count,
        }
    }

    /// Completion percentage
    pub fn completion_percentage(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.validated + self.failed_permanent) as f64 / total as f64 * 100.0
    }
}

/*!
 * Translation job.
 *
 * A job is one source document translated into one target language. It owns
 * the units, holds the ledger for its whole life, and ends with a report that
 * lists every unit that could not be translated.
 */

use std::sync::Arc;

use chrono::Utc;
use indicatif::ProgressBar;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::chunker::{Chunker, ChunkerConfig, DocumentSkeleton};
use super::context::{ContextConfig, ContextWindow};
use super::invoker::{Invoker, RetryConfig, RetryPolicy, Translator};
use super::reassembler::Reassembler;
use super::scheduler::{CancellationFlag, Scheduler, SchedulerConfig};
use super::unit::{Unit, UnitStatus};
use crate::document::{parse_document, Document};
use crate::errors::JobError;
use crate::ledger::{JobRecord, JobStatus, LedgerStore, UnitCounts};
use crate::validation::{ValidationConfig, Validator};

/// Number of hex digits kept from the job id hash
const JOB_ID_HEX_LEN: usize = 16;

/// Everything that shapes how a document is translated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub chunker: ChunkerConfig,

    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub validation: ValidationConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Give permanently failed units of a previous run a fresh set of attempts
    #[serde(default = "default_true")]
    pub retry_failed_on_resume: bool,

    /// Set `<html lang>` and `dir` of the output to the target language
    #[serde(default)]
    pub rewrite_language_attributes: bool,
}

fn default_true() -> bool {
    true
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            chunker: ChunkerConfig::default(),
            context: ContextConfig::default(),
            validation: ValidationConfig::default(),
            retry: RetryConfig::default(),
            scheduler: SchedulerConfig::default(),
            retry_failed_on_resume: true,
            rewrite_language_attributes: false,
        }
    }
}

/// Identity of the document being translated
#[derive(Debug, Clone, Copy)]
pub struct JobInput<'a> {
    /// Stable key of the document, usually its path relative to the input root
    pub document_key: &'a str,
    /// Source HTML
    pub html: &'a str,
    /// Language to translate into
    pub target_language: &'a str,
    /// Provider recorded with the job
    pub provider: &'a str,
    /// Model recorded with the job
    pub model: &'a str,
}

/// A unit that ended the run untranslated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitFailure {
    pub unit_id: String,
    pub index: usize,
    /// Structural path of the fragment
    pub path: String,
    /// Byte range of the fragment in its encoded run
    pub start: usize,
    pub end: usize,
    pub reason: String,
    pub attempt_count: u32,
}

/// Outcome of one job run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: String,
    /// Id of this run (uuid v4)
    pub run_id: String,
    pub document_key: String,
    pub source_language: String,
    pub target_language: String,
    pub status: JobStatus,
    pub total_units: usize,
    pub validated: usize,
    pub failed_permanent: usize,
    pub pending: usize,
    /// Units already validated by earlier runs
    pub resumed_units: usize,
    /// Translation calls issued by this run
    pub translation_calls: usize,
    /// Attempts recorded in the ledger over the life of the job
    pub total_attempts: u64,
    pub failures: Vec<UnitFailure>,
    pub cancelled: bool,
    pub started_at: String,
    pub finished_at: String,
}

impl JobReport {
    /// Whether every unit is terminal
    pub fn is_complete(&self) -> bool {
        self.pending == 0
    }
}

impl std::fmt::Display for JobReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}/{} validated, {} failed, {} pending ({} resumed, {} call(s))",
            self.document_key,
            self.validated,
            self.total_units,
            self.failed_permanent,
            self.pending,
            self.resumed_units,
            self.translation_calls
        )
    }
}

/// Stable job id for a document and target language
pub fn job_id(document_key: &str, target_language: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_key.as_bytes());
    hasher.update([0x1f]);
    hasher.update(target_language.as_bytes());
    let hex: String = hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect();
    hex[..JOB_ID_HEX_LEN].to_string()
}

fn sha256_hex(text: &str) -> String {
    Sha256::digest(text.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// One document being translated
pub struct Job {
    id: String,
    run_id: String,
    document_key: String,
    target_language: String,
    config: JobConfig,
    skeleton: DocumentSkeleton,
    units: Vec<Unit>,
    ledger: Arc<dyn LedgerStore>,
    resumed_units: usize,
    started_at: String,
}

impl Job {
    /// Parse and chunk the document, then bring the units up to date with the ledger.
    ///
    /// Units already validated in the ledger take their stored translation and
    /// will not be sent again.
    pub async fn prepare(
        input: JobInput<'_>,
        config: JobConfig,
        ledger: Arc<dyn LedgerStore>,
    ) -> Result<Self, JobError> {
        let started_at = Utc::now().to_rfc3339();
        let document = parse_document(input.html)?;
        let source_language = document.metadata().language.clone();

        let plan = Chunker::new(config.chunker.clone()).chunk(Arc::new(document));
        let skeleton = plan.skeleton;
        let mut units = plan.units;
        ContextWindow::new(config.context.clone()).annotate(&mut units);

        let id = job_id(input.document_key, input.target_language);
        let record = JobRecord::new(
            id.clone(),
            input.document_key.to_string(),
            sha256_hex(input.html),
            source_language,
            input.target_language.to_string(),
            input.provider.to_string(),
            input.model.to_string(),
            units.len() as i64,
        );
        ledger.register_job(&record).await.map_err(JobError::storage)?;

        let seeded = ledger.seed(&id, &units).await.map_err(JobError::storage)?;
        let pruned = ledger.retain(&id, &units).await.map_err(JobError::storage)?;
        if pruned > 0 {
            info!("Dropped {} ledger entry(ies) for text no longer in the document", pruned);
        }
        let (released, exhausted) = ledger
            .release_in_flight(&id, config.retry.max_attempts.max(1))
            .await
            .map_err(JobError::storage)?;
        if released > 0 {
            warn!("Released {} unit(s) left in flight by an interrupted run", released);
        }
        if exhausted > 0 {
            warn!("{} unit(s) were interrupted on their final attempt and marked failed", exhausted);
        }
        if config.retry_failed_on_resume {
            let reset = ledger.reset_failed(&id).await.map_err(JobError::storage)?;
            if reset > 0 {
                info!("Retrying {} unit(s) that failed in a previous run", reset);
            }
        }

        let entries = ledger.load(&id).await.map_err(JobError::storage)?;
        let mut resumed_units = 0;
        for unit in units.iter_mut() {
            let Some(entry) = entries.get(&unit.id) else {
                continue;
            };
            unit.attempt_count = entry.attempt_count;
            unit.failure_reason = entry.failure_reason.clone();
            match (entry.status, &entry.translated_text) {
                (UnitStatus::Validated, Some(text)) => {
                    unit.status = UnitStatus::Validated;
                    unit.translated_text = Some(text.clone());
                    resumed_units += 1;
                }
                (UnitStatus::FailedPermanent, _) => unit.status = UnitStatus::FailedPermanent,
                _ => unit.status = UnitStatus::Pending,
            }
        }

        info!(
            "Prepared job {} for {}: {} unit(s), {} new, {} already translated",
            id,
            input.document_key,
            units.len(),
            seeded,
            resumed_units
        );

        Ok(Self {
            id,
            run_id: uuid::Uuid::new_v4().to_string(),
            document_key: input.document_key.to_string(),
            target_language: input.target_language.to_string(),
            config,
            skeleton,
            units,
            ledger,
            resumed_units,
            started_at,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn skeleton(&self) -> &DocumentSkeleton {
        &self.skeleton
    }

    /// Unit counts of the in-memory state
    pub fn counts(&self) -> UnitCounts {
        let mut counts = UnitCounts::default();
        for unit in &self.units {
            counts.add(unit.status, 1);
        }
        counts
    }

    /// Translate every pending unit and report
    pub async fn run(
        &mut self,
        translator: Arc<dyn Translator>,
        cancel: CancellationFlag,
        progress: Option<ProgressBar>,
    ) -> Result<JobReport, JobError> {
        let invoker = Invoker::new(
            self.id.clone(),
            translator,
            Validator::new(&self.config.validation),
            Arc::clone(&self.ledger),
            RetryPolicy::new(self.config.retry.clone()),
        );
        let window = ContextWindow::new(self.config.context.clone());
        let metadata = self.skeleton.document().metadata().clone();

        let mut scheduler = Scheduler::new(
            &invoker,
            &window,
            &metadata,
            &self.target_language,
            self.config.scheduler.clone(),
        )
        .with_cancellation(cancel);
        if let Some(progress) = progress {
            progress.set_length(self.units.len() as u64);
            progress.set_position((self.units.len() - self.counts().pending) as u64);
            scheduler = scheduler.with_progress(progress);
        }

        let stats = scheduler.run(&mut self.units).await.map_err(JobError::storage)?;
        let counts = self.counts();
        let status = if counts.pending + counts.in_flight > 0 {
            if stats.cancelled {
                JobStatus::Cancelled
            } else {
                JobStatus::InProgress
            }
        } else if counts.failed_permanent > 0 {
            JobStatus::Partial
        } else {
            JobStatus::Completed
        };

        self.ledger
            .update_job_status(&self.id, status)
            .await
            .map_err(JobError::storage)?;
        let total_attempts = self
            .ledger
            .total_attempts(&self.id)
            .await
            .map_err(JobError::storage)?;

        let failures = self
            .units
            .iter()
            .filter(|u| u.status == UnitStatus::FailedPermanent)
            .map(|u| UnitFailure {
                unit_id: u.id.clone(),
                index: u.index,
                path: u.position.path.clone(),
                start: u.position.start,
                end: u.position.end,
                reason: u.failure_reason.clone().unwrap_or_default(),
                attempt_count: u.attempt_count,
            })
            .collect();

        let report = JobReport {
            job_id: self.id.clone(),
            run_id: self.run_id.clone(),
            document_key: self.document_key.clone(),
            source_language: metadata.language.clone(),
            target_language: self.target_language.clone(),
            status,
            total_units: self.units.len(),
            validated: counts.validated,
            failed_permanent: counts.failed_permanent,
            pending: counts.pending + counts.in_flight,
            resumed_units: self.resumed_units,
            translation_calls: invoker.calls(),
            total_attempts,
            failures,
            cancelled: stats.cancelled,
            started_at: self.started_at.clone(),
            finished_at: Utc::now().to_rfc3339(),
        };
        info!("Job {} finished: {}", self.id, report);
        Ok(report)
    }

    /// Build the translated document
    pub fn reassemble(&self) -> Result<Document, JobError> {
        let mut reassembler = Reassembler::new();
        if self.config.rewrite_language_attributes {
            reassembler = reassembler.rewrite_language(self.target_language.as_str());
        }
        Ok(reassembler.reassemble(&self.skeleton, &self.units)?)
    }
}

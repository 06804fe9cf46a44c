use anyhow::{anyhow, Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_config::{Config, TranslationProvider};
use crate::document::parse_document;
use crate::errors::AppError;
use crate::file_utils::FileManager;
use crate::language_utils;
use crate::ledger::{JobStatus, LedgerStore, SqliteLedger, UnitCounts};
use crate::providers::anthropic::Anthropic;
use crate::providers::mock::MockProvider;
use crate::providers::ollama::Ollama;
use crate::providers::Provider;
use crate::translation::{
    CancellationFlag, Job, JobInput, JobReport, PromptTemplate, ProviderTranslator, Translator,
};

// @module: Application controller for document translation

/// What happened to one input document
#[derive(Debug)]
pub enum DocumentOutcome {
    /// The job ran; the output was written when every unit is terminal
    Translated(JobReport),
    /// Nothing was done, with the reason
    Skipped(String),
}

/// Totals over one invocation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: usize,
    pub partial: usize,
    pub unfinished: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl RunSummary {
    fn add(&mut self, outcome: &DocumentOutcome) {
        match outcome {
            DocumentOutcome::Translated(report) => match report.status {
                JobStatus::Completed => self.completed += 1,
                JobStatus::Partial => self.partial += 1,
                JobStatus::InProgress | JobStatus::Cancelled => self.unfinished += 1,
            },
            DocumentOutcome::Skipped(_) => self.skipped += 1,
        }
    }

    /// Whether any document was left with untranslated or pending units
    pub fn has_problems(&self) -> bool {
        self.partial + self.unfinished + self.errors > 0
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} completed, {} partial, {} unfinished, {} skipped, {} errors",
            self.completed, self.partial, self.unfinished, self.skipped, self.errors
        )
    }
}

/// One line of the status listing
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub job_id: String,
    pub document_key: String,
    pub target_language: String,
    pub status: JobStatus,
    pub counts: UnitCounts,
    pub updated_at: String,
    pub resumable: bool,
}

/// Main application controller for document translation
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Durable unit state shared by every job
    ledger: Arc<dyn LedgerStore>,
    // @field: Translation capability
    translator: Arc<dyn Translator>,
    // @field: Provider behind the translator
    provider: Arc<dyn Provider>,
    // @field: Set on Ctrl-C
    cancel: CancellationFlag,
}

impl Controller {
    // @method: Create a controller with the provider and ledger named in the configuration
    pub fn with_config(config: Config) -> Result<Self> {
        let provider = Self::build_provider(&config)?;
        let ledger = match &config.ledger_path {
            Some(path) => SqliteLedger::open(path)?,
            None => SqliteLedger::open_default()?,
        };
        debug!("Ledger {}", ledger.repository().connection().stats()?);
        Ok(Self::with_components(config, provider, Arc::new(ledger)))
    }

    /// Create a controller from already built parts
    pub fn with_components(
        config: Config,
        provider: Arc<dyn Provider>,
        ledger: Arc<dyn LedgerStore>,
    ) -> Self {
        let common = &config.translation.common;
        let translator = ProviderTranslator::new(
            Arc::clone(&provider),
            PromptTemplate::new(&common.system_prompt),
        )
        .with_generation(common.max_tokens, common.temperature);

        Self {
            config,
            ledger,
            translator: Arc::new(translator),
            provider,
            cancel: CancellationFlag::new(),
        }
    }

    /// Instantiate the active provider
    pub fn build_provider(config: &Config) -> Result<Arc<dyn Provider>> {
        let translation = &config.translation;
        let model = translation.get_model();
        let timeout = translation.get_timeout_secs();
        let provider: Arc<dyn Provider> = match translation.provider {
            TranslationProvider::Ollama => {
                Arc::new(Ollama::new(translation.get_endpoint(), model, timeout))
            }
            TranslationProvider::Anthropic => {
                let api_key = translation.get_api_key();
                if api_key.is_empty() {
                    return Err(anyhow!("Anthropic provider requires an API key"));
                }
                Arc::new(Anthropic::new(api_key, translation.get_endpoint(), model, timeout))
            }
            TranslationProvider::Mock => Arc::new(MockProvider::working()),
        };
        debug!("Using provider {} with model {}", provider.name(), provider.model());
        Ok(provider)
    }

    /// Flag shared with the signal handler
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check that the provider answers before starting
    pub async fn test_connection(&self) -> Result<()> {
        self.provider
            .test_connection()
            .await
            .with_context(|| format!("Cannot reach {} provider", self.provider.name()))
    }

    /// Translate a single file or every HTML document under a directory
    pub async fn run(&self, input: PathBuf, output_dir: PathBuf, force_overwrite: bool) -> Result<RunSummary> {
        if FileManager::dir_exists(&input) {
            self.run_folder(input, output_dir, force_overwrite).await
        } else if FileManager::file_exists(&input) {
            let start_time = Instant::now();
            let multi_progress = MultiProgress::new();
            let root = input.clone();
            let mut summary = RunSummary::default();
            let outcome = self
                .translate_document(&input, &root, &output_dir, &multi_progress, force_overwrite)
                .await?;
            summary.add(&outcome);
            info!("Finished in {}: {}", Self::format_duration(start_time.elapsed()), summary);
            Ok(summary)
        } else {
            Err(AppError::File(format!("Input does not exist: {:?}", input)).into())
        }
    }

    /// Run every HTML document under a directory.
    ///
    /// A document that fails does not stop the others.
    pub async fn run_folder(&self, input_dir: PathBuf, output_dir: PathBuf, force_overwrite: bool) -> Result<RunSummary> {
        let start_time = Instant::now();
        let files = FileManager::find_html_files(&input_dir)?;
        if files.is_empty() {
            return Err(AppError::File(format!("No HTML documents found in directory: {:?}", input_dir)).into());
        }

        let multi_progress = MultiProgress::new();
        let folder_pb = multi_progress.add(ProgressBar::new(files.len() as u64));
        folder_pb.set_style(Self::progress_style("files"));
        folder_pb.set_message("Processing files");

        let mut summary = RunSummary::default();
        for file in &files {
            if self.cancel.is_cancelled() {
                warn!("Cancelled, {} document(s) not started", files.len() - folder_pb.position() as usize);
                break;
            }
            let key = FileManager::relative_key(file, &input_dir);
            folder_pb.set_message(format!("Processing: {}", key));

            match self
                .translate_document(file, &input_dir, &output_dir, &multi_progress, force_overwrite)
                .await
            {
                Ok(outcome) => summary.add(&outcome),
                Err(e) => {
                    error!("Error processing {}: {:#}", key, e);
                    summary.errors += 1;
                }
            }
            folder_pb.inc(1);
        }

        folder_pb.finish_with_message("Folder processing complete");
        info!(
            "Folder processing completed in {}: {}",
            Self::format_duration(start_time.elapsed()),
            summary
        );
        Ok(summary)
    }

    /// Translate one document and write its output and report
    pub async fn translate_document(
        &self,
        input_file: &Path,
        input_root: &Path,
        output_dir: &Path,
        multi_progress: &MultiProgress,
        force_overwrite: bool,
    ) -> Result<DocumentOutcome> {
        let key = FileManager::relative_key(input_file, input_root);
        let target_language = self.config.target_language.as_str();
        let output_path = FileManager::generate_output_path(input_file, input_root, output_dir, target_language);
        let report_path = FileManager::report_path(&output_path);

        if !force_overwrite && Self::is_finished(&output_path, &report_path) {
            warn!("Skipping {}, translation already complete (use -f to force overwrite)", key);
            return Ok(DocumentOutcome::Skipped("already translated".to_string()));
        }

        let html = FileManager::read_to_string(input_file)?;
        if let Some(expected) = &self.config.source_language {
            let declared = parse_document(&html)
                .with_context(|| format!("Failed to parse {}", key))?
                .metadata()
                .language
                .clone();
            if !language_utils::language_codes_match(expected, &declared) {
                warn!("Skipping {}, document language '{}' is not '{}'", key, declared, expected);
                return Ok(DocumentOutcome::Skipped(format!("language {}", declared)));
            }
        }

        let input = JobInput {
            document_key: &key,
            html: &html,
            target_language,
            provider: self.provider.name(),
            model: self.provider.model(),
        };
        let mut job = Job::prepare(input, self.config.job_config(), Arc::clone(&self.ledger)).await?;

        let progress = multi_progress.add(ProgressBar::new(job.units().len() as u64));
        progress.set_style(Self::progress_style("units"));
        progress.set_message(key.clone());

        let report = job
            .run(Arc::clone(&self.translator), self.cancel.clone(), Some(progress.clone()))
            .await?;
        progress.finish_and_clear();

        for failure in &report.failures {
            warn!(
                "{}: unit {} at {} [{}..{}] left untranslated after {} attempt(s): {}",
                key,
                failure.unit_id,
                failure.path,
                failure.start,
                failure.end,
                failure.attempt_count,
                failure.reason
            );
        }

        let json = serde_json::to_string_pretty(&report).context("Failed to serialize job report")?;
        FileManager::write_atomic(&report_path, &json)?;

        // The report exists even when the rebuild below fails
        if report.is_complete() {
            let document = job.reassemble()?;
            FileManager::write_atomic(&output_path, &document.to_html())?;
            info!("Success: {}", output_path.display());
        } else {
            warn!(
                "{}: {} unit(s) still pending, output not written; run again to resume",
                key, report.pending
            );
        }

        Ok(DocumentOutcome::Translated(report))
    }

    /// Every job in the ledger with its unit counts
    pub async fn status(&self) -> Result<Vec<JobSummary>> {
        let mut summaries = Vec::new();
        for job in self.ledger.list_jobs().await? {
            let counts = self.ledger.counts(&job.id).await?;
            let resumable = job.is_resumable();
            summaries.push(JobSummary {
                job_id: job.id,
                document_key: job.document_key,
                target_language: job.target_language,
                status: job.status,
                counts,
                updated_at: job.updated_at,
                resumable,
            });
        }
        Ok(summaries)
    }

    // Output exists and its report says every unit validated
    fn is_finished(output_path: &Path, report_path: &Path) -> bool {
        if !output_path.exists() {
            return false;
        }
        FileManager::read_to_string(report_path)
            .ok()
            .and_then(|json| serde_json::from_str::<JobReport>(&json).ok())
            .is_some_and(|report| report.status == JobStatus::Completed)
    }

    fn progress_style(unit: &str) -> ProgressStyle {
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} ({{percent}}%) {{msg}} {{eta}}",
                unit
            ))
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░")
    }

    // Format duration in a human-readable format
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}

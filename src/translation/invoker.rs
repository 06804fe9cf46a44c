/*!
 * Translation invoker.
 *
 * Runs exactly one attempt for one unit: claim it in the ledger, call the
 * translator under a timeout, sanitise and validate the answer, record the
 * outcome, and tell the scheduler what to do next.
 */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, warn};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::context::UnitContext;
use super::prompts::{build_user_prompt, PromptTemplate};
use super::unit::{Unit, UnitStatus};
use crate::errors::{AttemptFailure, ProviderError};
use crate::ledger::{LedgerEntry, LedgerStore};
use crate::providers::{CompletionRequest, Provider};
use crate::validation::{Validation, Validator};

/// A whole answer wrapped in a markdown code fence
static CODE_FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)\r?\n?```$").expect("Invalid code fence regex")
});

/// The per-unit translate capability
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` into `context.target_language`
    async fn translate(&self, text: &str, context: &UnitContext) -> Result<String, ProviderError>;
}

/// Translator backed by an LLM provider
#[derive(Debug)]
pub struct ProviderTranslator {
    provider: Arc<dyn Provider>,
    template: PromptTemplate,
    max_tokens: u32,
    temperature: f32,
}

impl ProviderTranslator {
    pub fn new(provider: Arc<dyn Provider>, template: PromptTemplate) -> Self {
        Self {
            provider,
            template,
            max_tokens: 4096,
            temperature: 0.3,
        }
    }

    /// Set the generation limits
    pub fn with_generation(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    /// The wrapped provider
    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }
}

#[async_trait]
impl Translator for ProviderTranslator {
    async fn translate(&self, text: &str, context: &UnitContext) -> Result<String, ProviderError> {
        let request = CompletionRequest {
            system: self.template.render(
                &context.source_language,
                &context.target_language,
                context.title.as_deref(),
            ),
            prompt: build_user_prompt(text, context),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        let response = self.provider.complete(request).await?;
        Ok(response.text)
    }
}

/// Retry and timeout settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per unit before it fails permanently
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound of the exponential delay, in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Random extra delay of up to this many milliseconds
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    /// Time allowed for a single translation call, in seconds
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Finer-grained call timeout in milliseconds; takes precedence when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_timeout_ms: Option<u64>,
}

fn default_max_attempts() -> u32 {
    4
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_jitter_ms() -> u64 {
    250
}

fn default_call_timeout_secs() -> u64 {
    120
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: default_jitter_ms(),
            call_timeout_secs: default_call_timeout_secs(),
            call_timeout_ms: None,
        }
    }
}

/// Exponential backoff with jitter
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }

    pub fn call_timeout(&self) -> Duration {
        match self.config.call_timeout_ms {
            Some(ms) => Duration::from_millis(ms),
            None => Duration::from_secs(self.config.call_timeout_secs),
        }
    }

    /// Delay before the attempt following attempt number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        let exponential = self.config.base_delay_ms.saturating_mul(1u64 << exponent);
        let capped = exponential.min(self.config.max_delay_ms);
        let jitter = if self.config.jitter_ms > 0 {
            rand::rng().random_range(0..=self.config.jitter_ms)
        } else {
            0
        };
        Duration::from_millis(capped + jitter)
    }
}

/// What the scheduler should do after an attempt
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// Accepted translation
    Validated(String),
    /// Try again after `delay`
    Retry { reason: String, delay: Duration },
    /// No further attempts
    FailedPermanent(String),
    /// The unit was not pending, nothing was done
    Skipped,
}

/// Trim the answer and unwrap a fenced code block
pub fn sanitize(raw: &str) -> String {
    let trimmed = raw.trim();
    match CODE_FENCE_RE.captures(trimmed) {
        Some(caps) => caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default().to_string(),
        None => trimmed.to_string(),
    }
}

/// Executes single attempts against the ledger
pub struct Invoker {
    job_id: String,
    translator: Arc<dyn Translator>,
    validator: Validator,
    ledger: Arc<dyn LedgerStore>,
    policy: RetryPolicy,
    calls: Arc<AtomicUsize>,
}

impl Invoker {
    pub fn new(
        job_id: impl Into<String>,
        translator: Arc<dyn Translator>,
        validator: Validator,
        ledger: Arc<dyn LedgerStore>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            translator,
            validator,
            ledger,
            policy,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Translation calls issued by this invoker
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run one attempt for `unit`.
    ///
    /// Errors are ledger failures only; everything that can go wrong with the
    /// translation itself is an outcome.
    pub async fn invoke_once(&self, unit: &Unit, context: &UnitContext) -> Result<AttemptOutcome> {
        let Some(attempt) = self.ledger.begin_attempt(&self.job_id, &unit.id).await? else {
            debug!("Unit {} is not pending, skipping", unit.id);
            return Ok(AttemptOutcome::Skipped);
        };

        self.calls.fetch_add(1, Ordering::SeqCst);
        let timeout = self.policy.call_timeout();
        let call = self.translator.translate(&unit.source_text, context);

        let failure = match tokio::time::timeout(timeout, call).await {
            Err(_) => AttemptFailure::Transient(format!(
                "timeout: no answer within {} ms",
                timeout.as_millis()
            )),
            Ok(Err(error)) => AttemptFailure::from_provider(&error),
            Ok(Ok(raw)) => {
                let text = sanitize(&raw);
                match self.validator.validate(unit, &text) {
                    Validation::Valid => {
                        let mut entry = self.entry(unit, attempt, UnitStatus::Validated);
                        entry.translated_text = Some(text.clone());
                        self.ledger.record(&entry).await?;
                        debug!("Unit {} validated on attempt {}", unit.id, attempt);
                        return Ok(AttemptOutcome::Validated(text));
                    }
                    Validation::Invalid(reason) => AttemptFailure::Transient(reason.to_string()),
                }
            }
        };

        let reason = failure.reason().to_string();
        if !failure.is_transient() || attempt >= self.policy.max_attempts() {
            warn!(
                "Unit {} failed permanently after {} attempt(s): {}",
                unit.id, attempt, reason
            );
            let mut entry = self.entry(unit, attempt, UnitStatus::FailedPermanent);
            entry.failure_reason = Some(reason.clone());
            self.ledger.record(&entry).await?;
            return Ok(AttemptOutcome::FailedPermanent(reason));
        }

        let delay = self.policy.backoff(attempt);
        debug!(
            "Unit {} attempt {} rejected ({}), retrying in {:?}",
            unit.id, attempt, reason, delay
        );
        let mut entry = self.entry(unit, attempt, UnitStatus::Pending);
        entry.failure_reason = Some(reason.clone());
        self.ledger.record(&entry).await?;
        Ok(AttemptOutcome::Retry { reason, delay })
    }

    fn entry(&self, unit: &Unit, attempt: u32, status: UnitStatus) -> LedgerEntry {
        let mut entry = LedgerEntry::pending(&self.job_id, &unit.id, unit.index);
        entry.status = status;
        entry.attempt_count = attempt;
        entry
    }
}

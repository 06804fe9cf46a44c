/*!
 * Bounded parallel scheduler.
 *
 * Drives every pending unit through `Pending -> InFlight -> {Validated |
 * Pending (retry) | FailedPermanent}`. One loop owns the queue: it keeps at
 * most `max_concurrent_requests` attempts running, parks retries until their
 * backoff expires, and stops dispatching when cancelled. Each unit sits in
 * the queue at most once, so a unit never has two attempts running.
 */

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::ProgressBar;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::context::{ContextWindow, TranslationSnapshot};
use super::invoker::{AttemptOutcome, Invoker};
use super::unit::{Unit, UnitStatus};
use crate::document::DocumentMetadata;

/// Scheduling limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Attempts running at the same time
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Stop dispatching once this many units failed permanently in a run
    #[serde(default)]
    pub max_permanent_failures: Option<usize>,
}

fn default_max_concurrent_requests() -> usize {
    4
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent_requests(),
            max_permanent_failures: None,
        }
    }
}

/// Shared stop signal. Setting it stops dispatching; running attempts finish.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What happened during one scheduler run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Units validated in this run
    pub validated: usize,
    /// Units that failed permanently in this run
    pub failed_permanent: usize,
    /// Attempts that ended in a retry
    pub retries: usize,
    /// Dispatches that found the unit already claimed
    pub skipped: usize,
    /// Whether the run stopped early
    pub cancelled: bool,
}

/// Drives units through the invoker
pub struct Scheduler<'a> {
    invoker: &'a Invoker,
    window: &'a ContextWindow,
    metadata: &'a DocumentMetadata,
    target_language: &'a str,
    config: SchedulerConfig,
    snapshot: TranslationSnapshot,
    cancel: CancellationFlag,
    progress: Option<ProgressBar>,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        invoker: &'a Invoker,
        window: &'a ContextWindow,
        metadata: &'a DocumentMetadata,
        target_language: &'a str,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            invoker,
            window,
            metadata,
            target_language,
            config,
            snapshot: TranslationSnapshot::new(),
            cancel: CancellationFlag::new(),
            progress: None,
        }
    }

    /// Use an externally controlled cancellation flag
    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Advance a progress bar as units become terminal
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Translate every pending unit.
    ///
    /// Only ledger failures are returned as errors; translation failures end
    /// up in the units' status.
    pub async fn run(&self, units: &mut [Unit]) -> Result<SchedulerStats> {
        let mut stats = SchedulerStats::default();
        let max_in_flight = self.config.max_concurrent_requests.max(1);

        for unit in units.iter() {
            if let (UnitStatus::Validated, Some(text)) = (unit.status, &unit.translated_text) {
                self.snapshot.insert(&unit.id, text);
            }
        }

        let mut ready: VecDeque<usize> = units
            .iter()
            .filter(|u| u.status == UnitStatus::Pending)
            .map(|u| u.index)
            .collect();
        let mut delayed: Vec<(Instant, usize)> = Vec::new();
        let mut in_flight = FuturesUnordered::new();

        info!(
            "Dispatching {} unit(s) with up to {} concurrent request(s)",
            ready.len(),
            max_in_flight
        );

        loop {
            let now = Instant::now();
            delayed.sort_by_key(|(at, index)| (*at, *index));
            while delayed.first().is_some_and(|(at, _)| *at <= now) {
                let (_, index) = delayed.remove(0);
                ready.push_back(index);
            }

            while !self.cancel.is_cancelled() && in_flight.len() < max_in_flight {
                let Some(i) = ready.pop_front() else {
                    break;
                };
                let unit = units[i].clone();
                units[i].status = UnitStatus::InFlight;
                let context = self
                    .window
                    .for_unit(units, i, &self.snapshot, self.metadata, self.target_language);
                let invoker = self.invoker;
                in_flight.push(async move {
                    let outcome = invoker.invoke_once(&unit, &context).await;
                    (i, outcome)
                });
            }

            if in_flight.is_empty() {
                if self.cancel.is_cancelled() {
                    break;
                }
                match delayed.first() {
                    Some((at, _)) => {
                        tokio::time::sleep_until(*at).await;
                        continue;
                    }
                    None if ready.is_empty() => break,
                    None => continue,
                }
            }

            let next_retry = delayed.first().map(|(at, _)| *at);
            let finished = match next_retry {
                Some(at) if !self.cancel.is_cancelled() => {
                    tokio::select! {
                        finished = in_flight.next() => finished,
                        _ = tokio::time::sleep_until(at) => continue,
                    }
                }
                _ => in_flight.next().await,
            };
            let Some((i, outcome)) = finished else {
                continue;
            };

            let unit = &mut units[i];
            match outcome? {
                AttemptOutcome::Validated(text) => {
                    unit.attempt_count += 1;
                    unit.status = UnitStatus::Validated;
                    unit.failure_reason = None;
                    self.snapshot.insert(&unit.id, &text);
                    unit.translated_text = Some(text);
                    stats.validated += 1;
                    self.advance_progress();
                }
                AttemptOutcome::Retry { reason, delay } => {
                    unit.attempt_count += 1;
                    unit.status = UnitStatus::Pending;
                    unit.failure_reason = Some(reason);
                    stats.retries += 1;
                    delayed.push((Instant::now() + delay, i));
                }
                AttemptOutcome::FailedPermanent(reason) => {
                    unit.attempt_count += 1;
                    unit.status = UnitStatus::FailedPermanent;
                    unit.failure_reason = Some(reason);
                    stats.failed_permanent += 1;
                    self.advance_progress();

                    if let Some(budget) = self.config.max_permanent_failures {
                        if stats.failed_permanent >= budget && !self.cancel.is_cancelled() {
                            warn!(
                                "{} unit(s) failed permanently, stopping dispatch",
                                stats.failed_permanent
                            );
                            self.cancel.cancel();
                        }
                    }
                }
                AttemptOutcome::Skipped => {
                    unit.status = UnitStatus::Pending;
                    stats.skipped += 1;
                }
            }
        }

        for (_, index) in delayed.drain(..) {
            debug!("Unit {} left pending after cancellation", units[index].id);
        }
        stats.cancelled = self.cancel.is_cancelled();
        Ok(stats)
    }

    fn advance_progress(&self) {
        if let Some(progress) = &self.progress {
            progress.inc(1);
        }
    }
}

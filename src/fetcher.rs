//! The resumable sequential fetch loop.
//!
//! For every identifier from the lowest resume point upward, each configured
//! category is visited in order. Successes move that category's checkpoint
//! forward straight away; misses feed a consecutive-failure counter. Once the
//! counter reaches the threshold the sequence is assumed to be exhausted:
//!
//! - [`FailurePolicy::PerCategory`]: that category stops, the others carry on
//!   until they stop too.
//! - [`FailurePolicy::Shared`]: the whole run stops.
//!
//! Requests are strictly sequential with a politeness delay between them.
//! Because a checkpoint is written after every success, an interrupted run
//! loses at most the identifier in flight.

use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::time::sleep;
use tracing::{info, instrument, warn};

use crate::checkpoint::CheckpointStore;
use crate::config::{CategoryRange, FailurePolicy};
use crate::error::Result;
use crate::import::ImportNotifier;
use crate::models::{Category, Identifier, StepOutcome};
use crate::source::PageSource;
use crate::step::FetchStep;

#[derive(Debug, Clone, Copy)]
pub struct FetcherOptions {
    pub failure_threshold: u32,
    pub failure_policy: FailurePolicy,
    pub request_delay: Duration,
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// Every category ran into its failure threshold.
    Exhausted,
    /// Every category reached its upper bound.
    UpperBound,
}

/// Progress of one category within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryState {
    pub category: Category,
    /// First identifier this run will try.
    pub resume_from: Identifier,
    pub upper_id: Identifier,
    /// Highest identifier successfully processed, as persisted.
    pub checkpoint: Option<Identifier>,
    pub failures: u32,
    pub exhausted: bool,
    pub saved: u64,
    pub already_present: u64,
    pub misses: u64,
}

impl CategoryState {
    fn new(range: &CategoryRange, checkpoint: Option<Identifier>) -> Self {
        let resume_from = checkpoint
            .map(|c| c.saturating_add(1).max(range.lower_id))
            .unwrap_or(range.lower_id);
        Self {
            category: range.category,
            resume_from,
            upper_id: range.upper_id,
            checkpoint,
            failures: 0,
            exhausted: false,
            saved: 0,
            already_present: 0,
            misses: 0,
        }
    }

    fn wants(&self, id: Identifier) -> bool {
        !self.exhausted && id >= self.resume_from && id <= self.upper_id
    }

    fn has_work_after(&self, id: Identifier) -> bool {
        !self.exhausted && self.resume_from <= self.upper_id && id < self.upper_id
    }
}

/// Everything that changes while a run progresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    pub categories: Vec<CategoryState>,
    pub shared_failures: u32,
}

impl RunState {
    /// Load each category's checkpoint and work out where to resume.
    pub async fn load(checkpoints: &CheckpointStore, ranges: &[CategoryRange]) -> Result<Self> {
        let mut categories = Vec::with_capacity(ranges.len());
        for range in ranges {
            let checkpoint = checkpoints.load(range.category).await?;
            let state = CategoryState::new(range, checkpoint);
            info!(
                category = %range.category,
                checkpoint = ?checkpoint,
                resume_from = state.resume_from,
                upper_id = state.upper_id,
                "Resume point"
            );
            categories.push(state);
        }
        Ok(Self {
            categories,
            shared_failures: 0,
        })
    }

    fn first_pending(&self) -> Option<Identifier> {
        self.categories
            .iter()
            .filter(|c| c.resume_from <= c.upper_id)
            .map(|c| c.resume_from)
            .min()
    }

    fn last_pending(&self) -> Option<Identifier> {
        self.categories.iter().map(|c| c.upper_id).max()
    }

    fn record(&mut self, index: usize, id: Identifier, outcome: &StepOutcome) {
        let state = &mut self.categories[index];
        match outcome {
            StepOutcome::Saved(..) | StepOutcome::AlreadyPresent(..) => {
                if matches!(outcome, StepOutcome::Saved(..)) {
                    state.saved += 1;
                } else {
                    state.already_present += 1;
                }
                state.failures = state.failures.saturating_sub(1);
                self.shared_failures = self.shared_failures.saturating_sub(1);
                if state.checkpoint.is_none_or(|c| id > c) {
                    state.checkpoint = Some(id);
                }
            }
            StepOutcome::NotFound | StepOutcome::FetchFailed(_) | StepOutcome::ExtractionFailed(_) => {
                state.misses += 1;
                state.failures += 1;
                self.shared_failures += 1;
            }
        }
    }

    /// Mark categories that hit the threshold. Returns `true` if the run
    /// should halt.
    fn apply_threshold(&mut self, threshold: u32, policy: FailurePolicy) -> bool {
        match policy {
            FailurePolicy::Shared => {
                if self.shared_failures >= threshold {
                    for state in self.categories.iter_mut().filter(|c| !c.exhausted) {
                        state.exhausted = true;
                    }
                    warn!(failures = self.shared_failures, threshold, "Failure threshold reached; halting run");
                    return true;
                }
                false
            }
            FailurePolicy::PerCategory => {
                for state in self.categories.iter_mut() {
                    if !state.exhausted && state.failures >= threshold {
                        state.exhausted = true;
                        info!(
                            category = %state.category,
                            failures = state.failures,
                            checkpoint = ?state.checkpoint,
                            "Failure threshold reached; category exhausted"
                        );
                    }
                }
                self.categories.iter().all(|c| c.exhausted)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub halt: HaltReason,
    pub state: RunState,
}

#[cfg(test)]
impl RunSummary {
    pub fn category(&self, category: Category) -> Option<&CategoryState> {
        self.state.categories.iter().find(|c| c.category == category)
    }
}

pub struct Fetcher<S, I> {
    step: FetchStep<S, I>,
    checkpoints: CheckpointStore,
    ranges: Vec<CategoryRange>,
    options: FetcherOptions,
}

impl<S, I> Fetcher<S, I>
where
    S: PageSource,
    I: ImportNotifier,
{
    pub fn new(
        step: FetchStep<S, I>,
        checkpoints: CheckpointStore,
        ranges: Vec<CategoryRange>,
        options: FetcherOptions,
    ) -> Self {
        Self {
            step,
            checkpoints,
            ranges,
            options,
        }
    }

    /// Run until every category is exhausted or past its upper bound.
    ///
    /// # Errors
    ///
    /// Malformed checkpoints and any failure to persist a checkpoint, record
    /// or quarantine file. Per-puzzle failures never end the run.
    #[instrument(level = "info", skip_all)]
    pub async fn run(&self) -> Result<RunSummary> {
        let started_at = Local::now();
        let mut state = RunState::load(&self.checkpoints, &self.ranges).await?;

        let (Some(first), Some(last)) = (state.first_pending(), state.last_pending()) else {
            return Ok(self.summary(started_at, HaltReason::UpperBound, state));
        };

        let mut halt = HaltReason::UpperBound;
        let mut requests = 0u64;

        for id in first..=last {
            for index in 0..state.categories.len() {
                if !state.categories[index].wants(id) {
                    continue;
                }
                if requests > 0 && !self.options.request_delay.is_zero() {
                    sleep(self.options.request_delay).await;
                }
                requests += 1;

                let category = state.categories[index].category;
                let outcome = self.step.process(category, id).await?;
                state.record(index, id, &outcome);

                if outcome.is_success() {
                    self.checkpoints.save(category, id).await?;
                }
            }

            if state.apply_threshold(self.options.failure_threshold, self.options.failure_policy) {
                halt = HaltReason::Exhausted;
                break;
            }
            if !state.categories.iter().any(|c| c.has_work_after(id)) {
                if state.categories.iter().any(|c| c.exhausted) {
                    halt = HaltReason::Exhausted;
                }
                break;
            }
        }

        Ok(self.summary(started_at, halt, state))
    }

    fn summary(&self, started_at: DateTime<Local>, halt: HaltReason, state: RunState) -> RunSummary {
        RunSummary {
            started_at,
            finished_at: Local::now(),
            halt,
            state,
        }
    }
}

#[cfg(test)]
impl<S, I> Fetcher<S, I> {
    pub fn step(&self) -> &FetchStep<S, I> {
        &self.step
    }
}

//! Batch controller: walks an identifier range with a sliding window of fetches.
//!
//! All batch state lives in one task. Concurrency comes only from the fetch
//! futures polled together in a `FuturesUnordered`; completions are handled
//! one at a time in the loop below, so counters need no locking.
//!
//! Connection failures feed a one-shot circuit breaker. Once the threshold of
//! consecutive failures is hit, every in-flight fetch is cancelled, its result
//! discarded, and the run fails with `Error::OutageDetected`.

use chrono::Local;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::config::{
    BatchConfig, DEFAULT_CONCURRENCY_LIMIT, DEFAULT_END, DEFAULT_OUTAGE_THRESHOLD, DEFAULT_START,
};
use crate::fetch::RecordSource;
use crate::identifier::{normalize_prefix, normalize_year, ProcessIdentifier, MAX_SEQUENCE};
use crate::progress::ProgressSink;
use crate::record::{FetchOutcome, ProcessRecord};
use crate::{info_time, Error, Result};


/// An inclusive range of sequence numbers under one prefix and year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub prefix: String,
    pub year: String,
    pub start: u32,
    pub end: u32,
    /// Keep only the most recent movement of each process.
    pub first_only: bool,
    pub concurrency_limit: usize,
    pub outage_threshold: usize,
}

impl BatchRequest {
    pub fn new(prefix: impl Into<String>, year: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            year: year.into(),
            start: DEFAULT_START,
            end: DEFAULT_END,
            first_only: false,
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            outage_threshold: DEFAULT_OUTAGE_THRESHOLD,
        }
    }

    pub fn from_config(
        prefix: impl Into<String>,
        year: impl Into<String>,
        cfg: &BatchConfig,
    ) -> Self {
        Self {
            start: cfg.default_start,
            end: cfg.default_end,
            concurrency_limit: cfg.concurrency_limit,
            outage_threshold: cfg.outage_threshold,
            ..Self::new(prefix, year)
        }
    }

    pub fn range(mut self, start: u32, end: u32) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn first_only(mut self, first_only: bool) -> Self {
        self.first_only = first_only;
        self
    }

    pub fn concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    pub fn outage_threshold(mut self, threshold: usize) -> Self {
        self.outage_threshold = threshold;
        self
    }

    /// Number of identifiers in the range.
    pub fn total(&self) -> usize {
        if self.start > self.end {
            return 0;
        }
        (self.end - self.start) as usize + 1
    }

    pub fn validate(&self) -> Result<()> {
        normalize_prefix(&self.prefix)?;
        normalize_year(&self.year)?;
        if self.start > self.end {
            return Err(Error::Validation(format!(
                "range start {} is after range end {}",
                self.start, self.end
            )));
        }
        if self.end > MAX_SEQUENCE {
            return Err(Error::Validation(format!(
                "range end {} exceeds {MAX_SEQUENCE}",
                self.end
            )));
        }
        if self.concurrency_limit == 0 {
            return Err(Error::Validation(
                "concurrency limit must be at least 1".to_string(),
            ));
        }
        if self.outage_threshold == 0 {
            return Err(Error::Validation(
                "outage threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// What a run that didn't hit an outage produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    pub records: Vec<ProcessRecord>,
    /// Attempts that finished without being cancelled.
    pub completed: usize,
    pub total: usize,
    /// The caller's token fired; `records` holds whatever finished first.
    pub cancelled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    /// Outage declared. Never closes again within a batch.
    Open,
}

/// What the controller must do after a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Cancelled fetch: not an attempt, nothing to report.
    Skip,
    Report { connectivity_warning: bool },
    OpenCircuit,
}

#[derive(Debug)]
struct BatchState {
    total: usize,
    threshold: usize,
    completed: usize,
    consecutive_errors: usize,
    records: Vec<ProcessRecord>,
    circuit: CircuitState,
}

impl BatchState {
    fn new(total: usize, threshold: usize) -> Self {
        Self {
            total,
            threshold,
            completed: 0,
            consecutive_errors: 0,
            records: Vec::new(),
            circuit: CircuitState::Closed,
        }
    }

    fn on_complete(&mut self, outcome: FetchOutcome) -> Step {
        match outcome {
            FetchOutcome::Cancelled => Step::Skip,
            FetchOutcome::ConnectionError(_) => {
                self.completed += 1;
                self.consecutive_errors += 1;
                if self.consecutive_errors >= self.threshold {
                    self.circuit = CircuitState::Open;
                    Step::OpenCircuit
                } else {
                    Step::Report {
                        connectivity_warning: true,
                    }
                }
            }
            FetchOutcome::Success(records) => {
                self.consecutive_errors = 0;
                self.completed += 1;
                self.records.extend(records);
                Step::Report {
                    connectivity_warning: false,
                }
            }
            FetchOutcome::EmptyResult => {
                self.consecutive_errors = 0;
                self.completed += 1;
                Step::Report {
                    connectivity_warning: false,
                }
            }
        }
    }
}

/// Fetches every identifier in `request`'s range through `source`.
///
/// At most `concurrency_limit` fetches run at once; a new one is admitted as soon as
/// any finishes. `sink` hears about every finished attempt, in completion order.
///
/// Cancelling `cancel` stops admission; in-flight fetches drain and the partial
/// result comes back with `cancelled` set. Hitting the outage threshold returns
/// `Error::OutageDetected` and drops everything still in flight.
pub async fn run_batch<S, P>(
    source: &S,
    request: &BatchRequest,
    sink: &mut P,
    cancel: &CancellationToken,
) -> Result<BatchResult>
where
    S: RecordSource + ?Sized,
    P: ProgressSink + ?Sized,
{
    request.validate()?;
    let first = ProcessIdentifier::new(&request.prefix, request.start, &request.year)?;
    let total = request.total();
    let first_only = request.first_only;
    let start_time = Local::now();
    info_time!(
        "Started batch {} .. {} ({} processes, window {})",
        first,
        first.with_sequence(request.end),
        total,
        request.concurrency_limit
    );

    // Child token: an outage cancels our fetches without touching the caller's token.
    let batch_token = cancel.child_token();
    let mut pending = (request.start..=request.end).map(|seq| first.with_sequence(seq));
    let mut in_flight = FuturesUnordered::new();
    let mut state = BatchState::new(total, request.outage_threshold);

    loop {
        while state.circuit == CircuitState::Closed
            && !batch_token.is_cancelled()
            && in_flight.len() < request.concurrency_limit
        {
            let Some(id) = pending.next() else {
                break;
            };
            let token = batch_token.clone();
            in_flight.push(async move {
                let outcome = source.fetch(&id, first_only, &token).await;
                (id, outcome)
            });
        }

        let Some((id, outcome)) = in_flight.next().await else {
            break;
        };

        match state.on_complete(outcome) {
            Step::Skip => {
                tracing::debug!(process = %id, "fetch cancelled");
            }
            Step::Report {
                connectivity_warning,
            } => {
                sink.report(state.completed, state.total, connectivity_warning);
            }
            Step::OpenCircuit => {
                sink.report(state.completed, state.total, true);
                tracing::error!(
                    process = %id,
                    consecutive_failures = state.consecutive_errors,
                    in_flight = in_flight.len(),
                    "origin unreachable, aborting batch"
                );
                batch_token.cancel();
                // Let in-flight work settle; its results are discarded.
                while in_flight.next().await.is_some() {}
                return Err(Error::OutageDetected {
                    consecutive_failures: state.consecutive_errors,
                    last_identifier: id.canonical(),
                });
            }
        }
    }

    let cancelled = cancel.is_cancelled();
    info_time!(
        start_time,
        "Finished batch: {}/{} attempts, {} records{}",
        state.completed,
        total,
        state.records.len(),
        if cancelled { " (cancelled)" } else { "" }
    );

    Ok(BatchResult {
        records: state.records,
        completed: state.completed,
        total,
        cancelled,
    })
}

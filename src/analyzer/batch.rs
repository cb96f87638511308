//! Batch driver: streams parcels through the analyzer over a bounded worker
//! pool, records progress and failure counts, and survives bad parcels.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::analyzer::{check_deadline, score_parcel};
use crate::config::Config;
use crate::error::{ConfigError, Error};
use crate::store::Store;
use crate::types::Analysis;

/// Progress lines and callbacks fire every this many parcels.
const PROGRESS_EVERY: usize = 1_000;

/// Options for a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Parcels per in-flight batch; defaults to `config.analysis_batch_size`.
    pub batch_size: Option<usize>,
    /// Analysis date; defaults to today (UTC).
    pub date: Option<NaiveDate>,
    /// Abort at the next batch boundary once this instant passes.
    pub deadline: Option<Instant>,
    /// Cooperative cancellation, observed at batch boundaries.
    pub cancel: Option<Arc<AtomicBool>>,
    /// Progress logging to stderr (0 = quiet).
    pub verbose: u8,
}

/// Per-parcel outcome, in input order.
#[derive(Debug)]
pub struct BatchOutcome {
    pub parcel_id: String,
    pub result: Result<Analysis, Error>,
}

/// Counts a batch run always produces, even when cancelled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub analyzed: usize,
    /// Targets that could not be scored (missing data, no peers).
    pub skipped_data: usize,
    /// Unknown or malformed parcel identifiers.
    pub skipped_input: usize,
    /// Store failures that persisted through one retry.
    pub failed_store: usize,
    pub cancelled: bool,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "analyzed {} (skipped-data {}, skipped-input {}, failed-store {}{})",
            self.analyzed,
            self.skipped_data,
            self.skipped_input,
            self.failed_store,
            if self.cancelled { ", cancelled" } else { "" },
        )
    }
}

/// Progress callback: (parcels processed, parcels total).
pub type ProgressFn<'a> = &'a (dyn Fn(usize, usize) + Sync);

/// Analyze the given parcels in input order, never aborting on a single bad
/// parcel. Failures are classified into the summary; a store failure that
/// survives its retry aborts the remaining batches.
pub fn analyze_batch(
    store: &mut Store,
    config: &Config,
    parcel_ids: &[String],
    options: &BatchOptions,
    on_progress: Option<ProgressFn<'_>>,
) -> Result<(Vec<BatchOutcome>, BatchSummary), Error> {
    run_batches(store, config, parcel_ids.to_vec(), options, on_progress, true)
}

/// Analyze every stored parcel (optionally from a resume offset, optionally
/// filtered by minimum data quality), persisting results and returning only
/// the summary.
pub fn analyze_all(
    store: &mut Store,
    config: &Config,
    offset: usize,
    min_quality: u8,
    options: &BatchOptions,
    on_progress: Option<ProgressFn<'_>>,
) -> Result<BatchSummary, Error> {
    let ids: Vec<String> = store
        .properties()
        .iter()
        .filter(|property| property.quality_score >= min_quality)
        .skip(offset)
        .map(|property| property.effective_parcel_id().to_string())
        .collect();

    run_batches(store, config, ids, options, on_progress, false).map(|(_, summary)| summary)
}

fn run_batches(
    store: &mut Store,
    config: &Config,
    parcel_ids: Vec<String>,
    options: &BatchOptions,
    on_progress: Option<ProgressFn<'_>>,
    keep_outcomes: bool,
) -> Result<(Vec<BatchOutcome>, BatchSummary), Error> {
    config.validate()?;
    check_deadline(options.deadline)?;

    let pool = ThreadPoolBuilder::new()
        .num_threads(config.worker_count)
        .build()
        .map_err(|_| {
            Error::Config(ConfigError::new(
                "worker_count",
                config.worker_count,
                "could not build a worker pool this size",
            ))
        })?;

    let batch_size = options.batch_size.unwrap_or(config.analysis_batch_size).max(1);
    let date = options.date.unwrap_or_else(|| Utc::now().date_naive());
    let total = parcel_ids.len();

    let mut outcomes = Vec::with_capacity(if keep_outcomes { total } else { 0 });
    let mut summary = BatchSummary::default();
    let mut processed = 0usize;
    let mut store_failed = false;

    'batches: for chunk in parcel_ids.chunks(batch_size) {
        if check_deadline(options.deadline).is_err()
            || options.cancel.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed))
        {
            summary.cancelled = true;
            break;
        }

        // Score in parallel over the shared store handle (indexed collect
        // keeps input order); persist below, from this thread.
        let snapshot: &Store = store;
        let results: Vec<Result<Analysis, Error>> = pool.install(|| {
            chunk
                .par_iter()
                .map(|parcel_id| match score_parcel(snapshot, config, parcel_id, date) {
                    // One retry for store failures, per operation.
                    Err(Error::Store(_)) => score_parcel(snapshot, config, parcel_id, date),
                    other => other,
                })
                .collect()
        });

        for (parcel_id, result) in chunk.iter().zip(results) {
            match &result {
                Ok(analysis) => {
                    store.upsert_analysis(analysis.clone());
                    summary.analyzed += 1;
                }
                Err(err) if err.is_input_error() => summary.skipped_input += 1,
                Err(err) if err.is_data_error() => summary.skipped_data += 1,
                Err(Error::Store(_)) => {
                    summary.failed_store += 1;
                    store_failed = true;
                }
                Err(_) => summary.skipped_data += 1,
            }
            if keep_outcomes {
                outcomes.push(BatchOutcome { parcel_id: parcel_id.clone(), result });
            }

            processed += 1;
            if processed % PROGRESS_EVERY == 0 {
                if options.verbose > 0 {
                    eprintln!("[batch] {processed}/{total}: {summary}");
                }
                if let Some(progress) = on_progress {
                    progress(processed, total);
                }
            }

            // A store failure that survived its retry aborts the batch.
            if store_failed {
                break 'batches;
            }
        }
    }

    if options.verbose > 0 {
        eprintln!("[batch] done: {summary}");
    }
    if let Some(progress) = on_progress {
        progress(processed, total);
    }
    Ok((outcomes, summary))
}

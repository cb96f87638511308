//! Analyzer orchestrator: composes comparables, fairness, and savings into
//! one idempotent analysis per parcel, decides a recommendation, persists.

mod batch;

use std::time::Instant;

use chrono::{NaiveDate, Utc};

use crate::comps::find_comparables;
use crate::config::Config;
use crate::error::Error;
use crate::fairness::score_fairness;
use crate::savings::estimate_savings;
use crate::store::Store;
use crate::types::{
    Analysis, AnalysisParameters, Cents, Methodology, Recommendation,
};

pub use batch::{analyze_all, analyze_batch, BatchOptions, BatchOutcome, BatchSummary, ProgressFn};

/// Minimum confidence for a strong appeal recommendation.
const MIN_STRONG_CONFIDENCE: u8 = 60;

/// Options for a single analysis.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Return `None` instead of a data error when the target cannot be
    /// scored.
    pub fail_soft: bool,
    /// Analysis date; defaults to today (UTC).
    pub date: Option<NaiveDate>,
    /// Abort (persisting nothing) once this instant passes.
    pub deadline: Option<Instant>,
}

pub(crate) fn check_deadline(deadline: Option<Instant>) -> Result<(), Error> {
    match deadline {
        Some(deadline) if Instant::now() >= deadline => Err(Error::Cancelled),
        _ => Ok(()),
    }
}

/// Score one parcel without persisting: created -> scored.
///
/// Pure over the store handle: the same store state and configuration always
/// produce the same analysis for a given date.
pub fn score_parcel(
    store: &Store,
    config: &Config,
    parcel_id: &str,
    date: NaiveDate,
) -> Result<Analysis, Error> {
    let target_id = store.resolve_parcel(parcel_id)?;
    let comparables = find_comparables(store, target_id, config)?;

    let target = store
        .property(target_id)
        .ok_or_else(|| Error::PropertyNotFound(parcel_id.to_string()))?;
    let fairness = score_fairness(store, target, &comparables);
    if !fairness.scoreable {
        let reason = if target.assessment_ratio().is_none() {
            "non-positive total value"
        } else {
            "no peers after filtering"
        };
        return Err(Error::Unscoreable {
            parcel: target.effective_parcel_id().to_string(),
            reason,
        });
    }

    let savings = estimate_savings(
        target.total_value_cents.unwrap_or(0),
        target.assessed_value_cents.unwrap_or(0),
        fairness.stats.median_ratio,
        config,
    );

    Ok(Analysis {
        property: target_id,
        analysis_date: date,
        fairness_score: fairness.score,
        assessment_ratio: round4(fairness.target_ratio),
        peer_median_ratio: fairness.stats.median_ratio,
        neighborhood_median_ratio: fairness.stats.neighborhood_median_ratio,
        subdivision_median_ratio: fairness.stats.subdivision_median_ratio,
        comparable_count: comparables.len() as u32,
        recommendation: recommend(
            config,
            fairness.score,
            fairness.confidence,
            savings.annual_savings_cents,
        ),
        estimated_savings_cents: savings.annual_savings_cents,
        five_year_savings_cents: savings.five_year_savings_cents,
        confidence: fairness.confidence,
        methodology: Methodology::Statistical,
        model_version: config.model_version.clone(),
        parameters: AnalysisParameters::from_config(config),
    })
}

/// Analyze one parcel and persist the result: created -> scored -> persisted.
///
/// Returns `Ok(None)` only under fail-soft behavior when the target cannot
/// be scored; unknown ids always fail with `PropertyNotFound`.
pub fn analyze(
    store: &mut Store,
    config: &Config,
    parcel_id: &str,
    options: &AnalyzeOptions,
) -> Result<Option<Analysis>, Error> {
    config.validate()?;
    check_deadline(options.deadline)?;

    let date = options.date.unwrap_or_else(|| Utc::now().date_naive());
    let analysis = match score_parcel(store, config, parcel_id, date) {
        Ok(analysis) => analysis,
        Err(err) if options.fail_soft && err.is_data_error() => return Ok(None),
        Err(err) => return Err(err),
    };

    // A missed deadline aborts before persistence; no partial analyses.
    check_deadline(options.deadline)?;
    store.upsert_analysis(analysis.clone());
    Ok(Some(analysis))
}

/// Persist an analysis row; idempotent on `(property, analysis_date)`.
pub fn save_analysis(store: &mut Store, analysis: Analysis) {
    store.upsert_analysis(analysis);
}

/// The latest persisted analysis for a parcel, if any.
pub fn get_latest_analysis<'s>(
    store: &'s Store,
    parcel_id: &str,
) -> Result<Option<&'s Analysis>, Error> {
    let id = store.resolve_parcel(parcel_id)?;
    Ok(store.latest_analysis(id))
}

/// Latest analyses at or above `min_score`, best savings first.
pub fn find_appeal_candidates(store: &Store, min_score: u8, limit: usize) -> Vec<&Analysis> {
    store.find_appeal_candidates(min_score, limit)
}

/// Apply the recommendation thresholds, strictly.
fn recommend(config: &Config, fairness: u8, confidence: u8, annual_savings: Cents) -> Recommendation {
    let scores = &config.fairness_thresholds;
    let savings = &config.savings_thresholds;

    if fairness >= scores.appeal_strong
        && confidence >= MIN_STRONG_CONFIDENCE
        && annual_savings >= savings.strong_cents
    {
        Recommendation::Appeal
    } else if fairness >= scores.appeal_moderate && annual_savings >= savings.moderate_cents {
        Recommendation::Appeal
    } else if fairness >= scores.monitor {
        Recommendation::Monitor
    } else {
        Recommendation::None
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

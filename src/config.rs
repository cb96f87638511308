use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Fairness-score thresholds for the recommendation rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FairnessThresholds {
    pub appeal_strong: u8,
    pub appeal_moderate: u8,
    pub monitor: u8,
}

impl Default for FairnessThresholds {
    fn default() -> Self {
        Self { appeal_strong: 70, appeal_moderate: 60, monitor: 50 }
    }
}

/// Annual-savings thresholds (integer cents) for the recommendation rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SavingsThresholds {
    pub strong_cents: i64,
    pub moderate_cents: i64,
}

impl Default for SavingsThresholds {
    fn default() -> Self {
        Self { strong_cents: 50_000, moderate_cents: 25_000 }
    }
}

/// All tunables of the analysis core, passed to constructors as one record.
///
/// Defaults match the documented configuration surface; `validate` rejects
/// out-of-range values before any component runs with them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Comparable total-value window as a fraction of the target's value.
    pub value_window_ratio: f64,
    /// Comparable acreage window as a fraction of the target's acreage.
    pub acre_window_ratio: f64,
    /// Proximity-tier search radius in great-circle miles.
    pub proximity_miles: f64,
    /// Maximum comparables returned per target.
    pub max_comparables: usize,
    /// Minimum subdivision-tier matches before the proximity tier is skipped.
    pub min_subdivision_matches: usize,

    /// Effective mill rate: annual tax change per unit of assessed value.
    /// A district-level placeholder until a per-district rate table exists.
    pub mill_rate_effective: f64,
    /// Discount applied to the five-year projection (1.0 = no discounting).
    pub discount_factor: f64,

    /// Fraction of bad source rows tolerated before an ingest load aborts.
    pub error_budget_fraction: f64,
    /// EPSG code of the parcel source coordinate system (state plane, US feet).
    pub source_epsg: u32,
    /// Attempt to repair self-intersecting polygons at ingest.
    /// Off by default: the policy is tolerate and flag.
    pub repair_geometries: bool,

    /// Number of parcels per in-flight batch.
    pub analysis_batch_size: usize,
    /// Worker threads for batch analysis.
    pub worker_count: usize,

    pub fairness_thresholds: FairnessThresholds,
    pub savings_thresholds: SavingsThresholds,

    /// Stamped onto every analysis; observers key caches off it.
    pub model_version: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            value_window_ratio: 0.20,
            acre_window_ratio: 0.25,
            proximity_miles: 0.5,
            max_comparables: 20,
            min_subdivision_matches: 5,
            mill_rate_effective: 0.02,
            discount_factor: 1.0,
            error_budget_fraction: 0.01,
            source_epsg: 2268,
            repair_geometries: false,
            analysis_batch_size: 100,
            worker_count: default_worker_count(),
            fairness_thresholds: FairnessThresholds::default(),
            savings_thresholds: SavingsThresholds::default(),
            model_version: "statistical-v1".to_string(),
        }
    }
}

/// One worker per available core, at least one.
fn default_worker_count() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

impl Config {
    /// Check every option against its documented range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.value_window_ratio > 0.0 && self.value_window_ratio <= 1.0) {
            return Err(ConfigError::new("value_window_ratio", self.value_window_ratio, "expected (0, 1]"));
        }
        if !(self.acre_window_ratio > 0.0 && self.acre_window_ratio <= 1.0) {
            return Err(ConfigError::new("acre_window_ratio", self.acre_window_ratio, "expected (0, 1]"));
        }
        if !(self.proximity_miles > 0.0 && self.proximity_miles.is_finite()) {
            return Err(ConfigError::new("proximity_miles", self.proximity_miles, "expected a positive distance"));
        }
        if self.max_comparables == 0 {
            return Err(ConfigError::new("max_comparables", self.max_comparables, "expected at least 1"));
        }
        if self.min_subdivision_matches == 0 {
            return Err(ConfigError::new("min_subdivision_matches", self.min_subdivision_matches, "expected at least 1"));
        }
        if !(self.mill_rate_effective >= 0.0 && self.mill_rate_effective.is_finite()) {
            return Err(ConfigError::new("mill_rate_effective", self.mill_rate_effective, "expected a non-negative rate"));
        }
        if !(self.discount_factor > 0.0 && self.discount_factor <= 1.0) {
            return Err(ConfigError::new("discount_factor", self.discount_factor, "expected (0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.error_budget_fraction) {
            return Err(ConfigError::new("error_budget_fraction", self.error_budget_fraction, "expected [0, 1]"));
        }
        if self.analysis_batch_size == 0 {
            return Err(ConfigError::new("analysis_batch_size", self.analysis_batch_size, "expected at least 1"));
        }
        if self.worker_count == 0 {
            return Err(ConfigError::new("worker_count", self.worker_count, "expected at least 1"));
        }
        if self.fairness_thresholds.monitor > self.fairness_thresholds.appeal_moderate
            || self.fairness_thresholds.appeal_moderate > self.fairness_thresholds.appeal_strong
        {
            return Err(ConfigError::new("fairness_thresholds", format!("{:?}", self.fairness_thresholds),
                "expected monitor <= appeal_moderate <= appeal_strong"));
        }
        if self.savings_thresholds.moderate_cents < 0 || self.savings_thresholds.strong_cents < 0 {
            return Err(ConfigError::new("savings_thresholds", format!("{:?}", self.savings_thresholds),
                "expected non-negative cents"));
        }
        if self.model_version.trim().is_empty() {
            return Err(ConfigError::new("model_version", &self.model_version, "expected a non-empty tag"));
        }
        Ok(())
    }
}

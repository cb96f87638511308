use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{Cents, PropertyId};

/// Recommended action for a parcel after analysis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Appeal,
    Monitor,
    #[default]
    None,
}

impl Recommendation {
    pub fn as_str(self) -> &'static str {
        match self {
            Recommendation::Appeal => "APPEAL",
            Recommendation::Monitor => "MONITOR",
            Recommendation::None => "NONE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "APPEAL" => Some(Recommendation::Appeal),
            "MONITOR" => Some(Recommendation::Monitor),
            "NONE" => Some(Recommendation::None),
            _ => None,
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the analysis was produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Methodology {
    #[default]
    Statistical,
}

impl Methodology {
    pub fn as_str(self) -> &'static str {
        match self {
            Methodology::Statistical => "STATISTICAL",
        }
    }
}

/// Interpretation band of a fairness score. Computed, never stored verbatim.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FairnessBand {
    UnderAssessed,
    Fair,
    PossiblyOver,
    LikelyOver,
    SignificantlyOver,
}

impl FairnessBand {
    /// Band for a fairness score in [0, 100].
    pub fn of(score: u8) -> Self {
        match score {
            0..=20 => FairnessBand::UnderAssessed,
            21..=40 => FairnessBand::Fair,
            41..=60 => FairnessBand::PossiblyOver,
            61..=80 => FairnessBand::LikelyOver,
            _ => FairnessBand::SignificantlyOver,
        }
    }
}

/// The parameters an analysis was produced under, persisted with the row so
/// any result can be reproduced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisParameters {
    pub value_window_ratio: f64,
    pub acre_window_ratio: f64,
    pub proximity_miles: f64,
    pub max_comparables: usize,
    pub min_subdivision_matches: usize,
    pub mill_rate_effective: f64,
    pub discount_factor: f64,
    pub model_version: String,
}

impl AnalysisParameters {
    pub fn from_config(config: &crate::Config) -> Self {
        Self {
            value_window_ratio: config.value_window_ratio,
            acre_window_ratio: config.acre_window_ratio,
            proximity_miles: config.proximity_miles,
            max_comparables: config.max_comparables,
            min_subdivision_matches: config.min_subdivision_matches,
            mill_rate_effective: config.mill_rate_effective,
            discount_factor: config.discount_factor,
            model_version: config.model_version.clone(),
        }
    }
}

/// One analysis of one property on one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub property: PropertyId,
    pub analysis_date: NaiveDate,

    /// 0 = tightest under-assessed, 100 = severely over-assessed.
    pub fairness_score: u8,
    /// Target assessed/total, rounded to four decimals.
    pub assessment_ratio: f64,
    /// Median assessed/total over the peer group.
    pub peer_median_ratio: f64,
    /// Median ratio over the same section-township-range, when computable.
    pub neighborhood_median_ratio: Option<f64>,
    /// Median ratio over the same subdivision, when one is set.
    pub subdivision_median_ratio: Option<f64>,
    pub comparable_count: u32,

    pub recommendation: Recommendation,
    pub estimated_savings_cents: Cents,
    pub five_year_savings_cents: Cents,
    /// 0-100; statistical strength of the peer set.
    pub confidence: u8,

    pub methodology: Methodology,
    pub model_version: String,
    pub parameters: AnalysisParameters,
}

impl Analysis {
    /// Interpretation band of this analysis's fairness score.
    #[inline]
    pub fn band(&self) -> FairnessBand {
        FairnessBand::of(self.fairness_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recommendation_round_trips_as_text() {
        for rec in [Recommendation::Appeal, Recommendation::Monitor, Recommendation::None] {
            assert_eq!(Recommendation::parse(rec.as_str()), Some(rec));
        }
        assert_eq!(Recommendation::parse("DEFER"), None);
    }

    #[test]
    fn bands_cover_the_documented_ranges() {
        assert_eq!(FairnessBand::of(0), FairnessBand::UnderAssessed);
        assert_eq!(FairnessBand::of(20), FairnessBand::UnderAssessed);
        assert_eq!(FairnessBand::of(21), FairnessBand::Fair);
        assert_eq!(FairnessBand::of(40), FairnessBand::Fair);
        assert_eq!(FairnessBand::of(60), FairnessBand::PossiblyOver);
        assert_eq!(FairnessBand::of(80), FairnessBand::LikelyOver);
        assert_eq!(FairnessBand::of(100), FairnessBand::SignificantlyOver);
    }
}

//! Fairness scoring: peer-ratio statistics and the piecewise mapping from
//! relative deviation to a 0-100 score.

use crate::comps::{Comparable, MatchTier};
use crate::store::Store;
use crate::types::{Property, PropertyId};

/// Assessment-ratio statistics over a peer group.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PeerStats {
    /// Peers with a positive total value that contributed a ratio.
    pub count: usize,
    pub median_ratio: f64,
    pub mean_ratio: f64,
    pub std_dev: f64,
    /// Median over the target's section-township-range, informational.
    pub neighborhood_median_ratio: Option<f64>,
    /// Median over the target's subdivision, informational.
    pub subdivision_median_ratio: Option<f64>,
}

/// Result of scoring one target against its peers.
#[derive(Clone, Debug, PartialEq)]
pub struct FairnessOutcome {
    /// 0 = tightest under-assessed, 100 = severely over-assessed.
    pub score: u8,
    /// 0-100; statistical strength of the peer set.
    pub confidence: u8,
    pub stats: PeerStats,
    /// Target assessed/total ratio; 0 when unscoreable.
    pub target_ratio: f64,
    /// Relative deviation (ratio - median) / median; 0 when unscoreable.
    pub deviation: f64,
    /// False when no recommendation may be issued (non-positive total value
    /// or no peers).
    pub scoreable: bool,
}

impl FairnessOutcome {
    fn unscoreable() -> Self {
        Self {
            score: 0,
            confidence: 0,
            stats: PeerStats::default(),
            target_ratio: 0.0,
            deviation: 0.0,
            scoreable: false,
        }
    }
}

/// Score how far a target's assessment ratio sits above its peer median.
pub fn score_fairness(store: &Store, target: &Property, peers: &[Comparable]) -> FairnessOutcome {
    let Some(target_ratio) = target.assessment_ratio() else {
        return FairnessOutcome::unscoreable();
    };

    let ratios: Vec<f64> = peers
        .iter()
        .filter_map(|comparable| store.property(comparable.property))
        .filter_map(Property::assessment_ratio)
        .collect();
    if ratios.is_empty() {
        return FairnessOutcome::unscoreable();
    }

    let median_ratio = median(&ratios);
    let mean_ratio = ratios.iter().sum::<f64>() / ratios.len() as f64;
    let std_dev = (ratios.iter().map(|r| (r - mean_ratio).powi(2)).sum::<f64>()
        / ratios.len() as f64)
        .sqrt();

    let stats = PeerStats {
        count: ratios.len(),
        median_ratio,
        mean_ratio,
        std_dev,
        neighborhood_median_ratio: group_median(
            store,
            target.str_token.as_deref().map(|t| store.str_members(t)).unwrap_or(&[]),
            target.id,
        ),
        subdivision_median_ratio: group_median(
            store,
            target.subdivision_name.as_deref().map(|n| store.subdivision_members(n)).unwrap_or(&[]),
            target.id,
        ),
    };

    let deviation = (target_ratio - median_ratio) / median_ratio;
    let score = map_deviation(deviation).round().clamp(0.0, 100.0) as u8;

    let proximity_only = peers.iter().all(|c| c.tier == MatchTier::Proximity);
    let confidence = confidence_for(&stats, deviation, proximity_only);

    FairnessOutcome { score, confidence, stats, target_ratio, deviation, scoreable: true }
}

/// Piecewise-linear mapping from relative deviation to [0, 100].
/// Monotone nondecreasing; the fair band spans the peer median.
pub(crate) fn map_deviation(d: f64) -> f64 {
    if d <= -0.30 {
        0.0
    } else if d <= -0.05 {
        20.0 * (d + 0.30) / 0.25
    } else if d < 0.05 {
        20.0 + 20.0 * (d + 0.05) / 0.10
    } else if d < 0.15 {
        40.0 + 20.0 * (d - 0.05) / 0.10
    } else if d < 0.25 {
        60.0 + 20.0 * (d - 0.15) / 0.10
    } else if d < 0.50 {
        80.0 + 20.0 * (d - 0.25) / 0.25
    } else {
        100.0
    }
}

/// Start at 100, deduct for thin, noisy, or borderline peer evidence.
fn confidence_for(stats: &PeerStats, deviation: f64, proximity_only: bool) -> u8 {
    let mut confidence: i32 = 100;
    if stats.count < 5 {
        confidence -= 40;
    } else if stats.count <= 9 {
        confidence -= 20;
    }
    if stats.std_dev > 0.05 {
        confidence -= 10;
    }
    // Within the noise floor of the median, the direction is not meaningful.
    if deviation.abs() <= 0.02 {
        confidence -= 20;
    }
    if proximity_only {
        confidence -= 20;
    }
    confidence.clamp(0, 100) as u8
}

/// Median ratio over a stored peer group, excluding the target itself.
fn group_median(store: &Store, members: &[PropertyId], exclude: PropertyId) -> Option<f64> {
    let ratios: Vec<f64> = members
        .iter()
        .filter(|&&id| id != exclude)
        .filter_map(|&id| store.property(id))
        .filter_map(Property::assessment_ratio)
        .collect();
    (!ratios.is_empty()).then(|| median(&ratios))
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

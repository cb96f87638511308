//! Savings estimation: invert the assessment math against the peer median.

use crate::config::Config;
use crate::types::Cents;

/// Estimated tax relief from bringing a target to the peer-median ratio.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SavingsEstimate {
    /// Assessed value implied by the peer median ratio.
    pub target_assessed_cents: Cents,
    /// Over-assessment above the implied value; floored at zero.
    pub delta_assessed_cents: Cents,
    pub annual_savings_cents: Cents,
    pub five_year_savings_cents: Cents,
}

/// Estimate annual and five-year savings for a successful appeal.
///
/// Returns zeroes when the target sits at or under the peer median; the
/// estimate is never negative.
pub fn estimate_savings(
    total_value_cents: Cents,
    assessed_value_cents: Cents,
    peer_median_ratio: f64,
    config: &Config,
) -> SavingsEstimate {
    let target_assessed_cents = (total_value_cents as f64 * peer_median_ratio).round() as Cents;
    let delta_assessed_cents = (assessed_value_cents - target_assessed_cents).max(0);
    let annual_savings_cents =
        (delta_assessed_cents as f64 * config.mill_rate_effective).round() as Cents;
    let five_year_savings_cents =
        (annual_savings_cents as f64 * 5.0 * config.discount_factor).round() as Cents;

    SavingsEstimate {
        target_assessed_cents,
        delta_assessed_cents,
        annual_savings_cents,
        five_year_savings_cents,
    }
}

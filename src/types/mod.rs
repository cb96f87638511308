mod analysis;
mod ids;
mod property;
mod subdivision;

pub use analysis::{Analysis, AnalysisParameters, FairnessBand, Methodology, Recommendation};
pub use ids::{PropertyId, SubdivisionId};
pub use property::Property;
pub use subdivision::Subdivision;

/// Monetary amounts are integer cents throughout; never floating dollars.
pub type Cents = i64;

/// Convert a whole-dollar source value to integer cents.
#[inline]
pub(crate) fn dollars_to_cents(dollars: f64) -> Cents {
    (dollars * 100.0).round() as Cents
}

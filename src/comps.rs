//! Comparable-property matching: a two-tier subdivision-then-proximity
//! strategy with filter windows on type, value, and acreage.

use std::fmt;

use ahash::AHashSet;

use crate::config::Config;
use crate::error::Error;
use crate::geom::{meters_to_miles, miles_to_meters};
use crate::store::Store;
use crate::types::{Property, PropertyId};

/// Which tier produced a comparable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchTier {
    /// Same platted subdivision as the target.
    Subdivision,
    /// Within the configured great-circle radius of the target.
    Proximity,
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchTier::Subdivision => "subdivision",
            MatchTier::Proximity => "proximity",
        })
    }
}

/// One ranked peer of a target parcel.
#[derive(Clone, Debug, PartialEq)]
pub struct Comparable {
    pub property: PropertyId,
    pub tier: MatchTier,
    /// Weighted similarity in [0, 100].
    pub similarity: f64,
    /// Great-circle miles from the target; 0 by definition in the
    /// subdivision tier.
    pub distance_miles: f64,
}

/// Find up to `max_comparables` ranked peers for a target parcel.
///
/// The returned set never contains the target; every candidate carries a
/// total value, acreage, and geometry. An empty result is not an error.
pub fn find_comparables(
    store: &Store,
    target: PropertyId,
    config: &Config,
) -> Result<Vec<Comparable>, Error> {
    let target_row = store
        .property(target)
        .ok_or_else(|| Error::PropertyNotFound(target.to_string()))?;

    let missing = if target_row.total_value_cents.is_none() {
        Some("total value")
    } else if target_row.acre_area.is_none() {
        Some("acreage")
    } else if target_row.geometry.is_none() || target_row.centroid.is_none() {
        Some("geometry")
    } else {
        None
    };
    if let Some(missing) = missing {
        return Err(Error::InsufficientData {
            parcel: target_row.effective_parcel_id().to_string(),
            missing,
        });
    }

    let windows = Windows::around(target_row, config);

    // Tier 1: same non-null subdivision name. Enough matches here and the
    // proximity tier never runs.
    let mut comparables: Vec<Comparable> = Vec::new();
    let mut seen: AHashSet<PropertyId> = AHashSet::new();

    if let Some(name) = &target_row.subdivision_name {
        for &candidate in store.subdivision_members(name) {
            if candidate == target {
                continue;
            }
            let Some(row) = store.property(candidate) else { continue };
            if row.comparable_ready() && windows.admit(row) {
                seen.insert(candidate);
                comparables.push(Comparable {
                    property: candidate,
                    tier: MatchTier::Subdivision,
                    similarity: windows.similarity(row, MatchTier::Subdivision, 0.0),
                    distance_miles: 0.0,
                });
            }
        }
    }

    // Tier 2: centroid proximity, same windows. Runs when the subdivision
    // tier came up short (or the target has no subdivision at all).
    if comparables.len() < config.min_subdivision_matches {
        let radius_meters = miles_to_meters(config.proximity_miles);
        let center = target_row.centroid.ok_or_else(|| Error::InsufficientData {
            parcel: target_row.effective_parcel_id().to_string(),
            missing: "geometry",
        })?;

        for (candidate, meters) in store.neighbors_within(center, radius_meters) {
            if candidate == target || seen.contains(&candidate) {
                continue;
            }
            let Some(row) = store.property(candidate) else { continue };
            if row.comparable_ready() && windows.admit(row) {
                let miles = meters_to_miles(meters);
                comparables.push(Comparable {
                    property: candidate,
                    tier: MatchTier::Proximity,
                    similarity: windows.similarity(row, MatchTier::Proximity, miles),
                    distance_miles: miles,
                });
            }
        }
    }

    // Descending similarity, then ascending distance, then ascending id for
    // reproducible ties.
    comparables.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then(a.distance_miles.total_cmp(&b.distance_miles))
            .then(a.property.cmp(&b.property))
    });
    comparables.truncate(config.max_comparables);
    Ok(comparables)
}

/// Filter windows and similarity weights around one target.
struct Windows {
    property_type: Option<String>,
    target_value_cents: i64,
    target_acres: f64,
    value_window_cents: f64,
    acre_window: f64,
    proximity_miles: f64,
}

impl Windows {
    fn around(target: &Property, config: &Config) -> Self {
        let target_value_cents = target.total_value_cents.unwrap_or(0);
        let target_acres = target.acre_area.unwrap_or(0.0);
        Self {
            property_type: target.property_type.clone(),
            target_value_cents,
            target_acres,
            value_window_cents: config.value_window_ratio * target_value_cents as f64,
            acre_window: config.acre_window_ratio * target_acres,
            proximity_miles: config.proximity_miles,
        }
    }

    /// Type equality plus value and acreage windows.
    fn admit(&self, candidate: &Property) -> bool {
        if candidate.property_type != self.property_type {
            return false;
        }
        let value_delta =
            (candidate.total_value_cents.unwrap_or(0) - self.target_value_cents).abs() as f64;
        if value_delta > self.value_window_cents {
            return false;
        }
        let acre_delta = (candidate.acre_area.unwrap_or(0.0) - self.target_acres).abs();
        acre_delta <= self.acre_window
    }

    /// Weighted similarity in [0, 100]:
    /// 10 type + 35 value proximity + 30 acreage proximity + 25 location.
    fn similarity(&self, candidate: &Property, tier: MatchTier, distance_miles: f64) -> f64 {
        let type_points =
            if candidate.property_type == self.property_type { 10.0 } else { 0.0 };

        let value_delta =
            (candidate.total_value_cents.unwrap_or(0) - self.target_value_cents).abs() as f64;
        let value_points = if self.value_window_cents > 0.0 {
            35.0 * (1.0 - value_delta / self.value_window_cents)
        } else {
            35.0 // zero-valued target admits only zero-valued peers
        };

        let acre_delta = (candidate.acre_area.unwrap_or(0.0) - self.target_acres).abs();
        let acre_points = if self.acre_window > 0.0 {
            30.0 * (1.0 - acre_delta / self.acre_window)
        } else {
            30.0
        };

        let location_points = match tier {
            MatchTier::Subdivision => 25.0,
            MatchTier::Proximity => 25.0 * (1.0 - distance_miles / self.proximity_miles),
        };

        (type_points + value_points.max(0.0) + acre_points.max(0.0) + location_points.max(0.0))
            .clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{MultiPolygon, Point};

    /// A grid-row of comparable single-family parcels around downtown.
    fn parcel(
        id: &str,
        subdivision: Option<&str>,
        lon: f64,
        total_dollars: i64,
        acres: f64,
    ) -> Property {
        Property {
            parcel_id: Some(id.to_string()),
            subdivision_name: subdivision.map(|s| s.to_string()),
            property_type: Some("RI".into()),
            total_value_cents: Some(total_dollars * 100),
            assessed_value_cents: Some(total_dollars * 20),
            acre_area: Some(acres),
            centroid: Some(Point::new(lon, 36.10)),
            geometry: Some(MultiPolygon(vec![])),
            ..Property::default()
        }
    }

    fn store_with(rows: Vec<Property>) -> Store {
        let mut store = Store::new();
        store.commit_properties(rows).unwrap();
        store
    }

    #[test]
    fn unknown_target_is_not_found() {
        let store = store_with(vec![parcel("a", None, -95.9, 250_000, 0.25)]);
        let err = find_comparables(&store, PropertyId(7), &Config::default()).unwrap_err();
        assert!(matches!(err, Error::PropertyNotFound(_)));
    }

    #[test]
    fn missing_acreage_is_insufficient_data() {
        let mut target = parcel("a", None, -95.9, 250_000, 0.25);
        target.acre_area = None;
        let store = store_with(vec![target, parcel("b", None, -95.9001, 250_000, 0.25)]);
        let err = find_comparables(&store, PropertyId(0), &Config::default()).unwrap_err();
        assert!(matches!(err, Error::InsufficientData { missing: "acreage", .. }));
    }

    #[test]
    fn subdivision_tier_wins_when_it_has_enough_matches() {
        let mut rows = vec![parcel("t", Some("MAPLE RIDGE"), -95.900, 250_000, 0.25)];
        for i in 0..6 {
            rows.push(parcel(
                &format!("s{i}"),
                Some("MAPLE RIDGE"),
                -95.900 + 0.0001 * i as f64,
                250_000,
                0.25,
            ));
        }
        // A nearby parcel outside the subdivision would match the windows,
        // but the subdivision tier is sufficient on its own.
        rows.push(parcel("near", None, -95.9002, 250_000, 0.25));

        let store = store_with(rows);
        let comparables = find_comparables(&store, PropertyId(0), &Config::default()).unwrap();
        assert_eq!(comparables.len(), 6);
        assert!(comparables.iter().all(|c| c.tier == MatchTier::Subdivision));
        assert!(comparables.iter().all(|c| c.distance_miles == 0.0));
    }

    #[test]
    fn proximity_tier_fills_in_when_subdivision_is_short() {
        let rows = vec![
            parcel("t", Some("MAPLE RIDGE"), -95.900, 250_000, 0.25),
            parcel("s0", Some("MAPLE RIDGE"), -95.9001, 250_000, 0.25),
            parcel("near0", None, -95.9002, 250_000, 0.25),
            parcel("near1", None, -95.9003, 250_000, 0.25),
            // ~5.5 miles away: outside the half-mile radius.
            parcel("far", None, -96.0, 250_000, 0.25),
        ];
        let store = store_with(rows);
        let comparables = find_comparables(&store, PropertyId(0), &Config::default()).unwrap();

        let tiers: Vec<MatchTier> = comparables.iter().map(|c| c.tier).collect();
        assert!(tiers.contains(&MatchTier::Subdivision));
        assert!(tiers.contains(&MatchTier::Proximity));
        assert_eq!(comparables.len(), 3); // far one excluded
        assert!(comparables.iter().all(|c| c.property != PropertyId(0)));
    }

    #[test]
    fn windows_exclude_value_and_acreage_outliers() {
        let rows = vec![
            parcel("t", None, -95.900, 250_000, 1.0),
            parcel("ok", None, -95.9001, 280_000, 1.1),     // inside both windows
            parcel("rich", None, -95.9002, 320_000, 1.0),   // +28% value
            parcel("ranch", None, -95.9003, 250_000, 1.3),  // +30% acreage
        ];
        let store = store_with(rows);
        let comparables = find_comparables(&store, PropertyId(0), &Config::default()).unwrap();
        assert_eq!(comparables.len(), 1);
        assert_eq!(comparables[0].property, PropertyId(1));
    }

    #[test]
    fn different_property_type_never_matches() {
        let mut other = parcel("b", None, -95.9001, 250_000, 0.25);
        other.property_type = Some("RV".into());
        let store = store_with(vec![parcel("t", None, -95.900, 250_000, 0.25), other]);
        let comparables = find_comparables(&store, PropertyId(0), &Config::default()).unwrap();
        assert!(comparables.is_empty());
    }

    #[test]
    fn results_are_capped_and_ordered_by_similarity() {
        let mut rows = vec![parcel("t", Some("MAPLE RIDGE"), -95.900, 250_000, 0.25)];
        for i in 0..30 {
            rows.push(parcel(
                &format!("s{i}"),
                Some("MAPLE RIDGE"),
                -95.900 + 0.0001 * i as f64,
                250_000 + 1_000 * i as i64,
                0.25,
            ));
        }
        let store = store_with(rows);
        let comparables = find_comparables(&store, PropertyId(0), &Config::default()).unwrap();

        assert_eq!(comparables.len(), 20);
        for pair in comparables.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
        // The closest-valued peer scores highest.
        assert_eq!(comparables[0].property, PropertyId(1));
    }

    #[test]
    fn score_ties_break_by_ascending_id() {
        let rows = vec![
            parcel("t", Some("MAPLE RIDGE"), -95.900, 250_000, 0.25),
            parcel("s1", Some("MAPLE RIDGE"), -95.9001, 250_000, 0.25),
            parcel("s2", Some("MAPLE RIDGE"), -95.9002, 250_000, 0.25),
        ];
        let store = store_with(rows);
        let comparables = find_comparables(&store, PropertyId(0), &Config::default()).unwrap();
        assert_eq!(comparables.len(), 2);
        assert!(comparables[0].property < comparables[1].property);
        assert_eq!(comparables[0].similarity, comparables[1].similarity);
    }
}

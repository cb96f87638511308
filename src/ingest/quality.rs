use chrono::NaiveDate;

use crate::store::{AuditReason, AuditRecord};
use crate::types::Property;

/// Score a property's data quality in [0, 100] and journal each deduction.
///
/// Start at 100; subtract 20 for a synthetic id, 15 for a zero (or absent)
/// total value, 10 for a missing owner, 5 for a missing physical address,
/// 25 for invalid geometry. When only a synthetic id is present the score is
/// additionally capped at 50.
pub(crate) fn score_property(property: &Property, today: NaiveDate) -> (u8, Vec<AuditRecord>) {
    let parcel_id = property.effective_parcel_id().to_string();
    let mut score: i32 = 100;
    let mut journal = Vec::new();

    let mut deduct = |points: i32, reason: AuditReason, journal: &mut Vec<AuditRecord>| {
        journal.push(AuditRecord {
            parcel_id: parcel_id.clone(),
            reason,
            points,
            recorded_on: today,
        });
        points
    };

    if property.is_synthetic() {
        score -= deduct(20, AuditReason::SyntheticId, &mut journal);
    }
    if property.total_value_cents.unwrap_or(0) == 0 {
        score -= deduct(15, AuditReason::ZeroTotalValue, &mut journal);
    }
    if property.owner_name.is_none() {
        score -= deduct(10, AuditReason::MissingOwner, &mut journal);
    }
    if property.property_address.is_none() {
        score -= deduct(5, AuditReason::MissingAddress, &mut journal);
    }
    if property.invalid_geometry {
        score -= deduct(25, AuditReason::InvalidGeometry, &mut journal);
    }

    if property.is_synthetic() && score > 50 {
        let capped = score - 50;
        deduct(capped, AuditReason::SyntheticCap, &mut journal);
        score = 50;
    }

    (score.clamp(0, 100) as u8, journal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        "2026-08-01".parse().unwrap()
    }

    fn full_property() -> Property {
        Property {
            parcel_id: Some("12345".into()),
            owner_name: Some("SMITH JOHN".into()),
            property_address: Some("100 MAIN ST".into()),
            total_value_cents: Some(10_000_00),
            ..Property::default()
        }
    }

    #[test]
    fn complete_row_scores_100() {
        let (score, journal) = score_property(&full_property(), today());
        assert_eq!(score, 100);
        assert!(journal.is_empty());
    }

    #[test]
    fn each_deduction_applies() {
        let property = Property {
            parcel_id: Some("12345".into()),
            total_value_cents: Some(0),
            invalid_geometry: true,
            ..Property::default()
        };
        // 100 - 15 (zero value) - 10 (owner) - 5 (address) - 25 (geometry)
        let (score, journal) = score_property(&property, today());
        assert_eq!(score, 45);
        assert_eq!(journal.len(), 4);
    }

    #[test]
    fn synthetic_only_rows_cap_at_50() {
        let property = Property {
            synthetic_parcel_id: Some("SYNTH-AAAA00000000".into()),
            owner_name: Some("SMITH JOHN".into()),
            property_address: Some("100 MAIN ST".into()),
            total_value_cents: Some(10_000_00),
            ..Property::default()
        };
        // 100 - 20 = 80, then capped at 50.
        let (score, journal) = score_property(&property, today());
        assert_eq!(score, 50);
        assert!(journal.iter().any(|r| r.reason == AuditReason::SyntheticCap));
    }

    #[test]
    fn score_clamps_at_zero() {
        let property = Property {
            synthetic_parcel_id: Some("SYNTH-AAAA00000000".into()),
            invalid_geometry: true,
            ..Property::default()
        };
        // 100 - 20 - 15 - 10 - 5 - 25 = 25, under the synthetic cap already.
        let (score, _) = score_property(&property, today());
        assert_eq!(score, 25);
    }
}

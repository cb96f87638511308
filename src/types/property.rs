use geo::{MultiPolygon, Point};

use crate::types::{Cents, PropertyId, SubdivisionId};

/// A single cadastral unit: a polygon with ownership and valuation attributes.
///
/// Invariant: at least one of `parcel_id` / `synthetic_parcel_id` is present
/// and non-empty, and the union of both is unique across the store.
#[derive(Debug, Clone, Default)]
pub struct Property {
    pub id: PropertyId,

    /// County-issued parcel code; absent for some source rows.
    pub parcel_id: Option<String>,
    /// Deterministic fallback identifier derived from the centroid WKT.
    pub synthetic_parcel_id: Option<String>,

    pub owner_name: Option<String>,
    /// Owner mailing address.
    pub owner_address: Option<String>,
    /// Physical (situs) address.
    pub property_address: Option<String>,
    /// Derived from the physical address.
    pub city: Option<String>,
    pub zip: Option<String>,

    /// Short property-type token, e.g. "RI", "RV".
    pub property_type: Option<String>,
    /// Section-township-range token.
    pub str_token: Option<String>,
    pub school_district: Option<String>,
    pub subdivision_name: Option<String>,
    /// Assigned by spatial containment at ingest; plain back-reference.
    pub subdivision: Option<SubdivisionId>,

    pub assessed_value_cents: Option<Cents>,
    pub land_value_cents: Option<Cents>,
    pub improvement_value_cents: Option<Cents>,
    pub total_value_cents: Option<Cents>,

    pub acre_area: Option<f64>,
    /// Source-provided perimeter/area in the Cartesian frame (feet / sq feet).
    pub shape_length: Option<f64>,
    pub shape_area: Option<f64>,

    pub building_count: u32,
    pub total_building_sqft: u64,
    pub largest_building_sqft: u64,

    /// Polygon in EPSG:4326.
    pub geometry: Option<MultiPolygon<f64>>,
    /// Centroid in EPSG:4326, cached at ingest.
    pub centroid: Option<Point<f64>>,
    /// Self-intersecting polygons are tolerated but flagged.
    pub invalid_geometry: bool,

    /// Data-quality score in [0, 100].
    pub quality_score: u8,
}

impl Property {
    /// The effective identifier: the county code when present, otherwise the
    /// synthetic one. Panics never: the store refuses rows with neither.
    #[inline]
    pub fn effective_parcel_id(&self) -> &str {
        self.parcel_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .or(self.synthetic_parcel_id.as_deref())
            .unwrap_or("")
    }

    /// True when only the synthetic identifier exists.
    #[inline]
    pub fn is_synthetic(&self) -> bool {
        self.parcel_id.as_deref().map_or(true, str::is_empty)
    }

    /// Assessed-to-total ratio, when both values are present and total is positive.
    #[inline]
    pub fn assessment_ratio(&self) -> Option<f64> {
        let assessed = self.assessed_value_cents?;
        let total = self.total_value_cents?;
        (total > 0).then(|| assessed as f64 / total as f64)
    }

    /// True when the row carries everything peer matching requires.
    #[inline]
    pub fn comparable_ready(&self) -> bool {
        self.total_value_cents.is_some()
            && self.acre_area.is_some()
            && self.geometry.is_some()
            && self.centroid.is_some()
    }
}

mod audit;
mod io;
mod manifest;

use ahash::AHashMap;
use chrono::NaiveDate;
use geo::Point;
use rstar::{primitives::GeomWithData, RTree};

use crate::error::{Error, StoreError};
use crate::geom::{degree_envelope, haversine_meters, Geometries};
use crate::types::{Analysis, Property, PropertyId, Subdivision, SubdivisionId};

pub use audit::{AuditReason, AuditRecord};

/// Centroid entry in the property R-tree.
type CentroidEntry = GeomWithData<[f64; 2], u32>;

/// The geometry store: spatially indexed tables for properties,
/// subdivisions, analyses, and the data-quality audit journal.
///
/// Only the ingest pipeline mutates the property and subdivision tables; the
/// analyzer writes only analyses. Loads are transactional by construction:
/// a new table set is built aside and swapped in on success.
#[derive(Debug, Default)]
pub struct Store {
    properties: Vec<Property>,
    subdivisions: Vec<Subdivision>,

    by_effective_id: AHashMap<String, PropertyId>,
    by_subdivision_name: AHashMap<String, Vec<PropertyId>>,
    by_str_token: AHashMap<String, Vec<PropertyId>>,
    centroid_tree: RTree<CentroidEntry>,
    subdivision_geoms: Geometries,

    analyses: Vec<Analysis>,
    analysis_index: AHashMap<(PropertyId, NaiveDate), usize>,
    latest: AHashMap<PropertyId, (NaiveDate, usize)>,

    audit: Vec<AuditRecord>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- property table ----

    /// Replace the property table with a freshly ingested one.
    ///
    /// Validates the identifier invariants before anything is swapped in;
    /// on error the prior table is untouched.
    pub fn commit_properties(&mut self, mut properties: Vec<Property>) -> Result<(), StoreError> {
        let mut by_effective_id = AHashMap::with_capacity(properties.len());

        for (i, property) in properties.iter_mut().enumerate() {
            property.id = PropertyId(i as u32);

            let effective = property.effective_parcel_id().to_string();
            if effective.is_empty() {
                return Err(StoreError::Invariant(format!(
                    "property row {i} has neither parcel_id nor synthetic_parcel_id"
                )));
            }
            if by_effective_id.insert(effective.clone(), property.id).is_some() {
                return Err(StoreError::Invariant(format!(
                    "duplicate effective parcel id {effective:?}"
                )));
            }
            if property.largest_building_sqft > property.total_building_sqft {
                return Err(StoreError::Invariant(format!(
                    "property {effective:?}: largest building exceeds building total"
                )));
            }
            if property.quality_score > 100 {
                return Err(StoreError::Invariant(format!(
                    "property {effective:?}: quality score out of range"
                )));
            }
        }

        self.by_effective_id = by_effective_id;
        self.properties = properties;
        self.rebuild_property_indexes();
        Ok(())
    }

    fn rebuild_property_indexes(&mut self) {
        let mut by_subdivision_name: AHashMap<String, Vec<PropertyId>> = AHashMap::new();
        let mut by_str_token: AHashMap<String, Vec<PropertyId>> = AHashMap::new();
        let mut centroids = Vec::with_capacity(self.properties.len());

        for property in &self.properties {
            if let Some(name) = &property.subdivision_name {
                by_subdivision_name.entry(name.clone()).or_default().push(property.id);
            }
            if let Some(token) = &property.str_token {
                by_str_token.entry(token.clone()).or_default().push(property.id);
            }
            if let Some(centroid) = property.centroid {
                centroids.push(CentroidEntry::new([centroid.x(), centroid.y()], property.id.0));
            }
        }

        self.by_subdivision_name = by_subdivision_name;
        self.by_str_token = by_str_token;
        self.centroid_tree = RTree::bulk_load(centroids);
    }

    #[inline]
    pub fn property(&self, id: PropertyId) -> Option<&Property> {
        self.properties.get(id.index())
    }

    #[inline]
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    #[inline]
    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// All property ids in table order; the batch driver streams these.
    pub fn property_ids(&self) -> impl Iterator<Item = PropertyId> + '_ {
        self.properties.iter().map(|property| property.id)
    }

    /// Resolve a caller-supplied parcel identifier (county or synthetic).
    pub fn resolve_parcel(&self, parcel_id: &str) -> Result<PropertyId, Error> {
        let trimmed = parcel_id.trim();
        if trimmed.is_empty()
            || trimmed.len() > 64
            || !trimmed.chars().all(|c| c.is_ascii_graphic() || c == ' ')
        {
            return Err(Error::MalformedParcelId(parcel_id.to_string()));
        }
        self.by_effective_id
            .get(trimmed)
            .copied()
            .ok_or_else(|| Error::PropertyNotFound(trimmed.to_string()))
    }

    /// Properties sharing a subdivision name. Empty for unknown names.
    pub fn subdivision_members(&self, name: &str) -> &[PropertyId] {
        self.by_subdivision_name.get(name).map_or(&[], Vec::as_slice)
    }

    /// Properties sharing a section-township-range token.
    pub fn str_members(&self, token: &str) -> &[PropertyId] {
        self.by_str_token.get(token).map_or(&[], Vec::as_slice)
    }

    /// Properties whose centroid lies within `radius_meters` great-circle
    /// meters of `center`, with their distances. Envelope prefilter on the
    /// R-tree, exact haversine check after.
    pub fn neighbors_within(&self, center: Point<f64>, radius_meters: f64) -> Vec<(PropertyId, f64)> {
        let envelope = degree_envelope(center, radius_meters);
        self.centroid_tree
            .locate_in_envelope_intersecting(&envelope)
            .filter_map(|entry| {
                let point = Point::new(entry.geom()[0], entry.geom()[1]);
                let meters = haversine_meters(center, point);
                (meters <= radius_meters).then_some((PropertyId(entry.data), meters))
            })
            .collect()
    }

    /// Record building metrics for one property.
    pub fn set_building_metrics(
        &mut self,
        id: PropertyId,
        count: u32,
        total_sqft: u64,
        largest_sqft: u64,
    ) -> Result<(), StoreError> {
        if largest_sqft > total_sqft {
            return Err(StoreError::Invariant(format!(
                "building metrics for {id}: largest {largest_sqft} exceeds total {total_sqft}"
            )));
        }
        let property = self
            .properties
            .get_mut(id.index())
            .ok_or_else(|| StoreError::Invariant(format!("no property row for {id}")))?;
        property.building_count = count;
        property.total_building_sqft = total_sqft;
        property.largest_building_sqft = largest_sqft;
        Ok(())
    }

    // ---- subdivision table ----

    /// Replace the subdivision table and rebuild its containment index.
    pub fn commit_subdivisions(&mut self, subdivisions: Vec<Subdivision>) {
        self.subdivision_geoms =
            Geometries::new(subdivisions.iter().map(|s| s.geometry.clone()).collect());
        self.subdivisions = subdivisions;
        for (i, subdivision) in self.subdivisions.iter_mut().enumerate() {
            subdivision.id = SubdivisionId(i as u32);
        }
    }

    #[inline]
    pub fn subdivision(&self, id: SubdivisionId) -> Option<&Subdivision> {
        self.subdivisions.get(id.index())
    }

    #[inline]
    pub fn subdivisions(&self) -> &[Subdivision] {
        &self.subdivisions
    }

    /// The subdivision polygon containing `point`, ties broken by smallest
    /// polygon area.
    pub fn containing_subdivision(&self, point: Point<f64>) -> Option<SubdivisionId> {
        self.subdivision_geoms
            .containing(point)
            .min_by(|&a, &b| {
                self.subdivision_geoms
                    .area(a)
                    .total_cmp(&self.subdivision_geoms.area(b))
            })
            .map(|idx| SubdivisionId(idx as u32))
    }

    /// Re-run subdivision attribution over every property centroid.
    /// Called after either table changes.
    pub(crate) fn attribute_subdivisions(&mut self) {
        let assignments: Vec<Option<SubdivisionId>> = self
            .properties
            .iter()
            .map(|property| property.centroid.and_then(|c| self.containing_subdivision(c)))
            .collect();
        for (property, subdivision) in self.properties.iter_mut().zip(assignments) {
            property.subdivision = subdivision;
        }
    }

    // ---- analyses table ----

    /// Insert or replace the analysis for `(property, analysis_date)`.
    /// Idempotent: a repeat call with the same key replaces the row.
    pub fn upsert_analysis(&mut self, analysis: Analysis) {
        let key = (analysis.property, analysis.analysis_date);
        match self.analysis_index.get(&key) {
            Some(&idx) => self.analyses[idx] = analysis,
            None => {
                let idx = self.analyses.len();
                self.analysis_index.insert(key, idx);
                let entry = self.latest.entry(key.0).or_insert((key.1, idx));
                if key.1 >= entry.0 {
                    *entry = (key.1, idx);
                }
                self.analyses.push(analysis);
            }
        }
    }

    /// The analysis for a property on a specific date, if any.
    pub fn analysis_on(&self, id: PropertyId, date: NaiveDate) -> Option<&Analysis> {
        self.analysis_index.get(&(id, date)).map(|&idx| &self.analyses[idx])
    }

    /// The analysis with the greatest date for a property, if any.
    pub fn latest_analysis(&self, id: PropertyId) -> Option<&Analysis> {
        self.latest.get(&id).map(|&(_, idx)| &self.analyses[idx])
    }

    /// Latest analyses with `fairness_score >= min_score`, ordered by
    /// descending estimated savings (ties by ascending property id).
    pub fn find_appeal_candidates(&self, min_score: u8, limit: usize) -> Vec<&Analysis> {
        let mut candidates: Vec<&Analysis> = self
            .latest
            .values()
            .map(|&(_, idx)| &self.analyses[idx])
            .filter(|analysis| analysis.fairness_score >= min_score)
            .collect();
        candidates.sort_by(|a, b| {
            b.estimated_savings_cents
                .cmp(&a.estimated_savings_cents)
                .then(a.property.cmp(&b.property))
        });
        candidates.truncate(limit);
        candidates
    }

    #[inline]
    pub fn analyses(&self) -> &[Analysis] {
        &self.analyses
    }

    // ---- audit journal ----

    /// Append data-quality deductions to the audit journal.
    pub fn append_audit(&mut self, records: impl IntoIterator<Item = AuditRecord>) {
        self.audit.extend(records);
    }

    #[inline]
    pub fn audit(&self) -> &[AuditRecord] {
        &self.audit
    }
}

//! Pack persistence: parquet tables plus a hashed manifest.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use geo::Point;
use polars::prelude::*;

use crate::common::fs::ensure_dir_exists;
use crate::error::StoreError;
use crate::geom::{multipolygon_from_wkb, multipolygon_to_wkb};
use crate::store::manifest::Manifest;
use crate::store::{AuditReason, AuditRecord, Store};
use crate::types::{
    Analysis, AnalysisParameters, Methodology, Property, PropertyId, Recommendation, Subdivision,
    SubdivisionId,
};

const PROPERTIES_FILE: &str = "properties.parquet";
const SUBDIVISIONS_FILE: &str = "subdivisions.parquet";
const ANALYSES_FILE: &str = "analyses.parquet";
const AUDIT_FILE: &str = "audit.parquet";

const TABLE_FILES: [&str; 4] = [PROPERTIES_FILE, SUBDIVISIONS_FILE, ANALYSES_FILE, AUDIT_FILE];

const DATE_FORMAT: &str = "%Y-%m-%d";

fn table_err(e: PolarsError) -> StoreError {
    StoreError::Table(e.to_string())
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io { path: path.to_path_buf(), source }
}

/// Build a binary geometry column from optional multipolygons.
fn geometry_column(name: &str, geoms: impl Iterator<Item = Option<Vec<u8>>>) -> Column {
    let ca: BinaryChunked = geoms.collect();
    ca.with_name(name.into()).into_column()
}

fn write_parquet(mut df: DataFrame, path: &Path) -> Result<(), StoreError> {
    let mut file = File::create(path).map_err(io_err(path))?;
    ParquetWriter::new(&mut file).finish(&mut df).map_err(table_err)?;
    Ok(())
}

fn read_parquet(path: &Path) -> Result<DataFrame, StoreError> {
    let file = File::open(path).map_err(io_err(path))?;
    ParquetReader::new(file).finish().map_err(table_err)
}

impl Store {
    /// Save all tables to a pack directory, replacing its contents.
    /// A transient write failure gets one retry with backoff.
    pub fn save(&self, dir: &Path) -> Result<(), StoreError> {
        crate::common::retry_once(|| self.write_pack(dir))
    }

    fn write_pack(&self, dir: &Path) -> Result<(), StoreError> {
        ensure_dir_exists(dir).map_err(io_err(dir))?;

        write_parquet(self.properties_frame()?, &dir.join(PROPERTIES_FILE))?;
        write_parquet(self.subdivisions_frame()?, &dir.join(SUBDIVISIONS_FILE))?;
        write_parquet(self.analyses_frame()?, &dir.join(ANALYSES_FILE))?;
        write_parquet(self.audit_frame()?, &dir.join(AUDIT_FILE))?;

        let counts = BTreeMap::from([
            ("properties", self.properties.len()),
            ("subdivisions", self.subdivisions.len()),
            ("analyses", self.analyses.len()),
            ("audit", self.audit.len()),
        ]);
        Manifest::new(dir, counts, &TABLE_FILES)?.write(dir)
    }

    /// Load a store from a pack directory, verifying the manifest hashes.
    pub fn load(dir: &Path) -> Result<Self, StoreError> {
        let manifest = Manifest::read(dir)?;
        manifest.verify(dir)?;

        let mut store = Store::new();
        let properties = read_properties(&read_parquet(&dir.join(PROPERTIES_FILE))?)?;
        store.commit_properties(properties)?;
        store.commit_subdivisions(read_subdivisions(&read_parquet(&dir.join(SUBDIVISIONS_FILE))?)?);
        for analysis in read_analyses(&read_parquet(&dir.join(ANALYSES_FILE))?)? {
            store.upsert_analysis(analysis);
        }
        store.append_audit(read_audit(&read_parquet(&dir.join(AUDIT_FILE))?)?);
        Ok(store)
    }

    fn properties_frame(&self) -> Result<DataFrame, StoreError> {
        let rows = &self.properties;
        DataFrame::new(vec![
            Column::new("parcel_id".into(),
                rows.iter().map(|p| p.parcel_id.clone()).collect::<Vec<_>>()),
            Column::new("synthetic_parcel_id".into(),
                rows.iter().map(|p| p.synthetic_parcel_id.clone()).collect::<Vec<_>>()),
            Column::new("owner_name".into(),
                rows.iter().map(|p| p.owner_name.clone()).collect::<Vec<_>>()),
            Column::new("owner_address".into(),
                rows.iter().map(|p| p.owner_address.clone()).collect::<Vec<_>>()),
            Column::new("property_address".into(),
                rows.iter().map(|p| p.property_address.clone()).collect::<Vec<_>>()),
            Column::new("city".into(),
                rows.iter().map(|p| p.city.clone()).collect::<Vec<_>>()),
            Column::new("zip".into(),
                rows.iter().map(|p| p.zip.clone()).collect::<Vec<_>>()),
            Column::new("property_type".into(),
                rows.iter().map(|p| p.property_type.clone()).collect::<Vec<_>>()),
            Column::new("str_token".into(),
                rows.iter().map(|p| p.str_token.clone()).collect::<Vec<_>>()),
            Column::new("school_district".into(),
                rows.iter().map(|p| p.school_district.clone()).collect::<Vec<_>>()),
            Column::new("subdivision_name".into(),
                rows.iter().map(|p| p.subdivision_name.clone()).collect::<Vec<_>>()),
            Column::new("subdivision_id".into(),
                rows.iter().map(|p| p.subdivision.map(|s| s.0)).collect::<Vec<_>>()),
            Column::new("assessed_value_cents".into(),
                rows.iter().map(|p| p.assessed_value_cents).collect::<Vec<_>>()),
            Column::new("land_value_cents".into(),
                rows.iter().map(|p| p.land_value_cents).collect::<Vec<_>>()),
            Column::new("improvement_value_cents".into(),
                rows.iter().map(|p| p.improvement_value_cents).collect::<Vec<_>>()),
            Column::new("total_value_cents".into(),
                rows.iter().map(|p| p.total_value_cents).collect::<Vec<_>>()),
            Column::new("acre_area".into(),
                rows.iter().map(|p| p.acre_area).collect::<Vec<_>>()),
            Column::new("shape_length".into(),
                rows.iter().map(|p| p.shape_length).collect::<Vec<_>>()),
            Column::new("shape_area".into(),
                rows.iter().map(|p| p.shape_area).collect::<Vec<_>>()),
            Column::new("building_count".into(),
                rows.iter().map(|p| p.building_count).collect::<Vec<_>>()),
            Column::new("total_building_sqft".into(),
                rows.iter().map(|p| p.total_building_sqft).collect::<Vec<_>>()),
            Column::new("largest_building_sqft".into(),
                rows.iter().map(|p| p.largest_building_sqft).collect::<Vec<_>>()),
            Column::new("invalid_geometry".into(),
                rows.iter().map(|p| p.invalid_geometry).collect::<Vec<_>>()),
            Column::new("quality_score".into(),
                rows.iter().map(|p| p.quality_score as u32).collect::<Vec<_>>()),
            geometry_column("geometry",
                rows.iter().map(|p| p.geometry.as_ref().map(multipolygon_to_wkb))),
            Column::new("centroid_lon".into(),
                rows.iter().map(|p| p.centroid.map(|c| c.x())).collect::<Vec<_>>()),
            Column::new("centroid_lat".into(),
                rows.iter().map(|p| p.centroid.map(|c| c.y())).collect::<Vec<_>>()),
        ])
        .map_err(table_err)
    }

    fn subdivisions_frame(&self) -> Result<DataFrame, StoreError> {
        let rows = &self.subdivisions;
        DataFrame::new(vec![
            Column::new("name".into(),
                rows.iter().map(|s| s.name.clone()).collect::<Vec<_>>()),
            Column::new("cama_name".into(),
                rows.iter().map(|s| s.cama_name.clone()).collect::<Vec<_>>()),
            Column::new("shape_length".into(),
                rows.iter().map(|s| s.shape_length).collect::<Vec<_>>()),
            Column::new("shape_area".into(),
                rows.iter().map(|s| s.shape_area).collect::<Vec<_>>()),
            Column::new("area".into(),
                rows.iter().map(|s| s.area).collect::<Vec<_>>()),
            geometry_column("geometry",
                rows.iter().map(|s| Some(multipolygon_to_wkb(&s.geometry)))),
            Column::new("centroid_lon".into(),
                rows.iter().map(|s| s.centroid.map(|c| c.x())).collect::<Vec<_>>()),
            Column::new("centroid_lat".into(),
                rows.iter().map(|s| s.centroid.map(|c| c.y())).collect::<Vec<_>>()),
        ])
        .map_err(table_err)
    }

    fn analyses_frame(&self) -> Result<DataFrame, StoreError> {
        let rows = &self.analyses;
        let parameters = rows
            .iter()
            .map(|a| {
                serde_json::to_string(&a.parameters)
                    .map_err(|e| StoreError::Table(format!("analysis parameters: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        DataFrame::new(vec![
            Column::new("property_id".into(),
                rows.iter().map(|a| a.property.0).collect::<Vec<_>>()),
            Column::new("analysis_date".into(),
                rows.iter().map(|a| a.analysis_date.format(DATE_FORMAT).to_string()).collect::<Vec<_>>()),
            Column::new("fairness_score".into(),
                rows.iter().map(|a| a.fairness_score as u32).collect::<Vec<_>>()),
            Column::new("assessment_ratio".into(),
                rows.iter().map(|a| a.assessment_ratio).collect::<Vec<_>>()),
            Column::new("peer_median_ratio".into(),
                rows.iter().map(|a| a.peer_median_ratio).collect::<Vec<_>>()),
            Column::new("neighborhood_median_ratio".into(),
                rows.iter().map(|a| a.neighborhood_median_ratio).collect::<Vec<_>>()),
            Column::new("subdivision_median_ratio".into(),
                rows.iter().map(|a| a.subdivision_median_ratio).collect::<Vec<_>>()),
            Column::new("comparable_count".into(),
                rows.iter().map(|a| a.comparable_count).collect::<Vec<_>>()),
            Column::new("recommendation".into(),
                rows.iter().map(|a| a.recommendation.as_str()).collect::<Vec<_>>()),
            Column::new("estimated_savings_cents".into(),
                rows.iter().map(|a| a.estimated_savings_cents).collect::<Vec<_>>()),
            Column::new("five_year_savings_cents".into(),
                rows.iter().map(|a| a.five_year_savings_cents).collect::<Vec<_>>()),
            Column::new("confidence".into(),
                rows.iter().map(|a| a.confidence as u32).collect::<Vec<_>>()),
            Column::new("methodology".into(),
                rows.iter().map(|a| a.methodology.as_str()).collect::<Vec<_>>()),
            Column::new("model_version".into(),
                rows.iter().map(|a| a.model_version.clone()).collect::<Vec<_>>()),
            Column::new("analysis_parameters".into(), parameters),
        ])
        .map_err(table_err)
    }

    fn audit_frame(&self) -> Result<DataFrame, StoreError> {
        let rows = &self.audit;
        DataFrame::new(vec![
            Column::new("parcel_id".into(),
                rows.iter().map(|r| r.parcel_id.clone()).collect::<Vec<_>>()),
            Column::new("reason".into(),
                rows.iter().map(|r| r.reason.as_str()).collect::<Vec<_>>()),
            Column::new("points".into(),
                rows.iter().map(|r| r.points).collect::<Vec<_>>()),
            Column::new("recorded_on".into(),
                rows.iter().map(|r| r.recorded_on.format(DATE_FORMAT).to_string()).collect::<Vec<_>>()),
        ])
        .map_err(table_err)
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| StoreError::Corrupt(format!("bad date {s:?}: {e}")))
}

fn point_from(lon: Option<f64>, lat: Option<f64>) -> Option<Point<f64>> {
    Some(Point::new(lon?, lat?))
}

fn read_properties(df: &DataFrame) -> Result<Vec<Property>, StoreError> {
    let get_str = |name: &str| df.column(name).and_then(|c| c.str().cloned()).map_err(table_err);
    let get_i64 = |name: &str| df.column(name).and_then(|c| c.i64().cloned()).map_err(table_err);
    let get_f64 = |name: &str| df.column(name).and_then(|c| c.f64().cloned()).map_err(table_err);
    let get_u32 = |name: &str| df.column(name).and_then(|c| c.u32().cloned()).map_err(table_err);
    let get_u64 = |name: &str| df.column(name).and_then(|c| c.u64().cloned()).map_err(table_err);

    let parcel_id = get_str("parcel_id")?;
    let synthetic_parcel_id = get_str("synthetic_parcel_id")?;
    let owner_name = get_str("owner_name")?;
    let owner_address = get_str("owner_address")?;
    let property_address = get_str("property_address")?;
    let city = get_str("city")?;
    let zip = get_str("zip")?;
    let property_type = get_str("property_type")?;
    let str_token = get_str("str_token")?;
    let school_district = get_str("school_district")?;
    let subdivision_name = get_str("subdivision_name")?;
    let subdivision_id = get_u32("subdivision_id")?;
    let assessed = get_i64("assessed_value_cents")?;
    let land = get_i64("land_value_cents")?;
    let improvement = get_i64("improvement_value_cents")?;
    let total = get_i64("total_value_cents")?;
    let acre_area = get_f64("acre_area")?;
    let shape_length = get_f64("shape_length")?;
    let shape_area = get_f64("shape_area")?;
    let building_count = get_u32("building_count")?;
    let total_building = get_u64("total_building_sqft")?;
    let largest_building = get_u64("largest_building_sqft")?;
    let invalid_geometry =
        df.column("invalid_geometry").and_then(|c| c.bool().cloned()).map_err(table_err)?;
    let quality_score = get_u32("quality_score")?;
    let geometry = df.column("geometry").and_then(|c| c.binary().cloned()).map_err(table_err)?;
    let centroid_lon = get_f64("centroid_lon")?;
    let centroid_lat = get_f64("centroid_lat")?;

    let owned = |v: Option<&str>| v.map(String::from);

    (0..df.height())
        .map(|i| {
            let geometry = geometry
                .get(i)
                .map(|bytes| {
                    multipolygon_from_wkb(bytes)
                        .map_err(|e| StoreError::Corrupt(format!("property geometry row {i}: {e}")))
                })
                .transpose()?;

            Ok(Property {
                id: PropertyId(i as u32),
                parcel_id: owned(parcel_id.get(i)),
                synthetic_parcel_id: owned(synthetic_parcel_id.get(i)),
                owner_name: owned(owner_name.get(i)),
                owner_address: owned(owner_address.get(i)),
                property_address: owned(property_address.get(i)),
                city: owned(city.get(i)),
                zip: owned(zip.get(i)),
                property_type: owned(property_type.get(i)),
                str_token: owned(str_token.get(i)),
                school_district: owned(school_district.get(i)),
                subdivision_name: owned(subdivision_name.get(i)),
                subdivision: subdivision_id.get(i).map(SubdivisionId),
                assessed_value_cents: assessed.get(i),
                land_value_cents: land.get(i),
                improvement_value_cents: improvement.get(i),
                total_value_cents: total.get(i),
                acre_area: acre_area.get(i),
                shape_length: shape_length.get(i),
                shape_area: shape_area.get(i),
                building_count: building_count.get(i).unwrap_or(0),
                total_building_sqft: total_building.get(i).unwrap_or(0),
                largest_building_sqft: largest_building.get(i).unwrap_or(0),
                geometry,
                centroid: point_from(centroid_lon.get(i), centroid_lat.get(i)),
                invalid_geometry: invalid_geometry.get(i).unwrap_or(false),
                quality_score: quality_score.get(i).unwrap_or(0).min(100) as u8,
            })
        })
        .collect()
}

fn read_subdivisions(df: &DataFrame) -> Result<Vec<Subdivision>, StoreError> {
    let name = df.column("name").and_then(|c| c.str().cloned()).map_err(table_err)?;
    let cama_name = df.column("cama_name").and_then(|c| c.str().cloned()).map_err(table_err)?;
    let shape_length = df.column("shape_length").and_then(|c| c.f64().cloned()).map_err(table_err)?;
    let shape_area = df.column("shape_area").and_then(|c| c.f64().cloned()).map_err(table_err)?;
    let area = df.column("area").and_then(|c| c.f64().cloned()).map_err(table_err)?;
    let geometry = df.column("geometry").and_then(|c| c.binary().cloned()).map_err(table_err)?;
    let centroid_lon = df.column("centroid_lon").and_then(|c| c.f64().cloned()).map_err(table_err)?;
    let centroid_lat = df.column("centroid_lat").and_then(|c| c.f64().cloned()).map_err(table_err)?;

    (0..df.height())
        .map(|i| {
            let bytes = geometry
                .get(i)
                .ok_or_else(|| StoreError::Corrupt(format!("subdivision row {i} lacks geometry")))?;
            Ok(Subdivision {
                id: SubdivisionId(i as u32),
                name: name
                    .get(i)
                    .ok_or_else(|| StoreError::Corrupt(format!("subdivision row {i} lacks a name")))?
                    .to_string(),
                cama_name: cama_name.get(i).map(String::from),
                shape_length: shape_length.get(i),
                shape_area: shape_area.get(i),
                geometry: multipolygon_from_wkb(bytes)
                    .map_err(|e| StoreError::Corrupt(format!("subdivision geometry row {i}: {e}")))?,
                centroid: point_from(centroid_lon.get(i), centroid_lat.get(i)),
                area: area.get(i).unwrap_or(0.0),
            })
        })
        .collect()
}

fn read_analyses(df: &DataFrame) -> Result<Vec<Analysis>, StoreError> {
    let property_id = df.column("property_id").and_then(|c| c.u32().cloned()).map_err(table_err)?;
    let analysis_date = df.column("analysis_date").and_then(|c| c.str().cloned()).map_err(table_err)?;
    let fairness = df.column("fairness_score").and_then(|c| c.u32().cloned()).map_err(table_err)?;
    let ratio = df.column("assessment_ratio").and_then(|c| c.f64().cloned()).map_err(table_err)?;
    let median = df.column("peer_median_ratio").and_then(|c| c.f64().cloned()).map_err(table_err)?;
    let neighborhood =
        df.column("neighborhood_median_ratio").and_then(|c| c.f64().cloned()).map_err(table_err)?;
    let subdivision =
        df.column("subdivision_median_ratio").and_then(|c| c.f64().cloned()).map_err(table_err)?;
    let comparables = df.column("comparable_count").and_then(|c| c.u32().cloned()).map_err(table_err)?;
    let recommendation = df.column("recommendation").and_then(|c| c.str().cloned()).map_err(table_err)?;
    let savings =
        df.column("estimated_savings_cents").and_then(|c| c.i64().cloned()).map_err(table_err)?;
    let five_year =
        df.column("five_year_savings_cents").and_then(|c| c.i64().cloned()).map_err(table_err)?;
    let confidence = df.column("confidence").and_then(|c| c.u32().cloned()).map_err(table_err)?;
    let methodology = df.column("methodology").and_then(|c| c.str().cloned()).map_err(table_err)?;
    let model_version = df.column("model_version").and_then(|c| c.str().cloned()).map_err(table_err)?;
    let parameters =
        df.column("analysis_parameters").and_then(|c| c.str().cloned()).map_err(table_err)?;

    (0..df.height())
        .map(|i| {
            let corrupt = |what: &str| StoreError::Corrupt(format!("analysis row {i} lacks {what}"));
            let recommendation_text = recommendation.get(i).ok_or_else(|| corrupt("recommendation"))?;
            let methodology_text = methodology.get(i).ok_or_else(|| corrupt("methodology"))?;
            let parameters_text = parameters.get(i).ok_or_else(|| corrupt("parameters"))?;
            let parameters: AnalysisParameters = serde_json::from_str(parameters_text)
                .map_err(|e| StoreError::Corrupt(format!("analysis parameters row {i}: {e}")))?;

            Ok(Analysis {
                property: PropertyId(property_id.get(i).ok_or_else(|| corrupt("property id"))?),
                analysis_date: parse_date(analysis_date.get(i).ok_or_else(|| corrupt("date"))?)?,
                fairness_score: fairness.get(i).ok_or_else(|| corrupt("fairness"))?.min(100) as u8,
                assessment_ratio: ratio.get(i).ok_or_else(|| corrupt("ratio"))?,
                peer_median_ratio: median.get(i).ok_or_else(|| corrupt("peer median"))?,
                neighborhood_median_ratio: neighborhood.get(i),
                subdivision_median_ratio: subdivision.get(i),
                comparable_count: comparables.get(i).ok_or_else(|| corrupt("comparable count"))?,
                recommendation: Recommendation::parse(recommendation_text)
                    .ok_or_else(|| StoreError::Corrupt(format!("bad recommendation {recommendation_text:?}")))?,
                estimated_savings_cents: savings.get(i).ok_or_else(|| corrupt("savings"))?,
                five_year_savings_cents: five_year.get(i).ok_or_else(|| corrupt("projection"))?,
                confidence: confidence.get(i).ok_or_else(|| corrupt("confidence"))?.min(100) as u8,
                methodology: match methodology_text {
                    "STATISTICAL" => Methodology::Statistical,
                    other => {
                        return Err(StoreError::Corrupt(format!("bad methodology {other:?}")));
                    }
                },
                model_version: model_version.get(i).ok_or_else(|| corrupt("model version"))?.to_string(),
                parameters,
            })
        })
        .collect()
}

fn read_audit(df: &DataFrame) -> Result<Vec<AuditRecord>, StoreError> {
    let parcel_id = df.column("parcel_id").and_then(|c| c.str().cloned()).map_err(table_err)?;
    let reason = df.column("reason").and_then(|c| c.str().cloned()).map_err(table_err)?;
    let points = df.column("points").and_then(|c| c.i32().cloned()).map_err(table_err)?;
    let recorded_on = df.column("recorded_on").and_then(|c| c.str().cloned()).map_err(table_err)?;

    (0..df.height())
        .map(|i| {
            let corrupt = |what: &str| StoreError::Corrupt(format!("audit row {i} lacks {what}"));
            let reason_text = reason.get(i).ok_or_else(|| corrupt("reason"))?;
            Ok(AuditRecord {
                parcel_id: parcel_id.get(i).ok_or_else(|| corrupt("parcel id"))?.to_string(),
                reason: AuditReason::parse(reason_text)
                    .ok_or_else(|| StoreError::Corrupt(format!("bad audit reason {reason_text:?}")))?,
                points: points.get(i).ok_or_else(|| corrupt("points"))?,
                recorded_on: parse_date(recorded_on.get(i).ok_or_else(|| corrupt("date"))?)?,
            })
        })
        .collect()
}

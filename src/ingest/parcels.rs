use std::path::Path;
use std::sync::LazyLock;

use ahash::AHashSet;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use geo::{Area, Centroid, MultiPolygon, Point, Validation};
use regex::Regex;
use sha2::{Digest, Sha256};
use shapefile::dbase::Record;
use shapefile::Shape;

use crate::config::Config;
use crate::error::Error;
use crate::geom::{multipolygon_perimeter, shape_to_multipolygon, Reprojector};
use crate::ingest::{
    character_field, check_error_budget, check_schema, numeric_field, quality, read_shapefile,
    IngestSummary,
};
use crate::store::Store;
use crate::types::{dollars_to_cents, Property};

const REQUIRED_FIELDS: [&str; 14] = [
    "PARCEL_ID", "OWNER_NAME", "OWNER_ADDR", "SITE_ADDR", "PROP_TYPE", "LAND_VAL", "IMPR_VAL",
    "ASSD_VAL", "TOTAL_VAL", "STR", "SCHOOL", "SUBDIV", "SHAPE_Leng", "SHAPE_Area",
];

const SQFT_PER_ACRE: f64 = 43_560.0;

/// Trailing "<city>, <state> <zip>" of a situs address.
static ADDRESS_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i),\s*([A-Za-z][A-Za-z .'-]*?)\s*,?\s+[A-Za-z]{2}\s+(\d{5})(?:-\d{4})?\s*$")
        .unwrap()
});

/// Load parcel polygons into the store, replacing the property table.
///
/// The load is transactional: any abort (unreadable source, schema mismatch,
/// error-budget exceedance) leaves the prior store state untouched.
pub fn load_properties(
    store: &mut Store,
    source: &Path,
    config: &Config,
    verbose: u8,
) -> Result<IngestSummary, Error> {
    config.validate().map_err(Error::Config)?;
    let reproj = Reprojector::for_epsg(config.source_epsg).map_err(Error::Ingest)?;

    if verbose > 0 {
        eprintln!("[ingest] loading parcels from {}", source.display());
    }
    let rows = read_shapefile(source).map_err(Error::Ingest)?;
    check_schema(source, &rows, &REQUIRED_FIELDS).map_err(Error::Ingest)?;

    let today = Utc::now().date_naive();
    let mut summary = IngestSummary { total_rows: rows.len(), ..IngestSummary::default() };
    let mut properties: Vec<Property> = Vec::with_capacity(rows.len());
    let mut journal = Vec::new();
    let mut seen_keys: AHashSet<(Option<String>, Option<String>, i64, String)> = AHashSet::new();
    let mut seen_ids: AHashSet<String> = AHashSet::new();

    for (i, (shape, record)) in rows.into_iter().enumerate() {
        let mut property = match parse_row(shape, &record, &reproj, config.repair_geometries) {
            Ok(property) => property,
            Err(err) => {
                summary.errors += 1;
                if verbose > 1 {
                    eprintln!("[ingest] row {i}: {err:#}");
                }
                continue;
            }
        };

        // Empty placeholder rows carry nothing worth keeping.
        if property.parcel_id.is_none()
            && property.property_address.is_none()
            && property.owner_name.is_none()
            && property.total_value_cents.unwrap_or(0) == 0
        {
            summary.skipped_placeholders += 1;
            continue;
        }

        // Duplicate under (address, owner, total value, centroid hash):
        // rows arrive in internal-id order, so the first one wins.
        let key = (
            property.property_address.clone(),
            property.owner_name.clone(),
            property.total_value_cents.unwrap_or(0),
            property.centroid.map(centroid_digest).unwrap_or_default(),
        );
        if !seen_keys.insert(key) {
            summary.deduplicated += 1;
            continue;
        }
        if !seen_ids.insert(property.effective_parcel_id().to_string()) {
            summary.deduplicated += 1;
            continue;
        }

        if property.invalid_geometry {
            summary.invalid_geometries += 1;
        }
        if property.is_synthetic() {
            summary.synthetic_ids += 1;
        }

        let (score, deductions) = quality::score_property(&property, today);
        property.quality_score = score;
        journal.extend(deductions);
        properties.push(property);
    }

    check_error_budget(summary.errors, summary.total_rows, config.error_budget_fraction)
        .map_err(Error::Ingest)?;

    summary.loaded = properties.len();
    store.commit_properties(properties).map_err(Error::Store)?;
    store.attribute_subdivisions();
    store.append_audit(journal);

    if verbose > 0 {
        eprintln!("[ingest] {summary}");
    }
    Ok(summary)
}

/// Convert one source row into a Property in storage form.
fn parse_row(
    shape: Shape,
    record: &Record,
    reproj: &Reprojector,
    repair: bool,
) -> Result<Property> {
    let plane = shape_to_multipolygon(shape)?;

    // Perimeter/area stay in the source Cartesian frame (feet), as provided
    // by the source where possible, rounded to integers.
    let shape_length = numeric_field(record, "SHAPE_Leng")
        .or_else(|| (!plane.0.is_empty()).then(|| multipolygon_perimeter(&plane)))
        .map(f64::round);
    let shape_area = numeric_field(record, "SHAPE_Area")
        .or_else(|| (!plane.0.is_empty()).then(|| plane.unsigned_area()))
        .map(f64::round);

    let mut geometry = if plane.0.is_empty() {
        None
    } else {
        Some(reproj.plane_to_lonlat(&plane).context("parcel reprojection failed")?)
    };

    let mut invalid_geometry = false;
    if let Some(mp) = &geometry {
        invalid_geometry = !mp.is_valid();
        if invalid_geometry && repair {
            let repaired = rewind_rings(mp);
            if repaired.is_valid() {
                geometry = Some(repaired);
                invalid_geometry = false;
            }
        }
    }

    let centroid = geometry.as_ref().and_then(Centroid::centroid);

    let parcel_id = character_field(record, "PARCEL_ID");
    let synthetic_parcel_id = match (&parcel_id, centroid) {
        (Some(_), _) => None,
        (None, Some(point)) => Some(synthetic_id(point)),
        (None, None) => bail!("row has neither a parcel code nor a geometry centroid"),
    };

    let property_address = character_field(record, "SITE_ADDR");
    let (city, zip) = property_address
        .as_deref()
        .and_then(parse_city_zip)
        .map_or((None, None), |(city, zip)| (Some(city), Some(zip)));

    Ok(Property {
        parcel_id,
        synthetic_parcel_id,
        owner_name: character_field(record, "OWNER_NAME"),
        owner_address: character_field(record, "OWNER_ADDR"),
        property_address,
        city,
        zip,
        property_type: character_field(record, "PROP_TYPE").map(|s| s.to_uppercase()),
        str_token: character_field(record, "STR").map(|s| s.to_uppercase()),
        school_district: character_field(record, "SCHOOL").map(|s| s.to_uppercase()),
        subdivision_name: character_field(record, "SUBDIV").map(|s| s.to_uppercase()),
        assessed_value_cents: numeric_field(record, "ASSD_VAL").map(dollars_to_cents),
        land_value_cents: numeric_field(record, "LAND_VAL").map(dollars_to_cents),
        improvement_value_cents: numeric_field(record, "IMPR_VAL").map(dollars_to_cents),
        total_value_cents: numeric_field(record, "TOTAL_VAL").map(dollars_to_cents),
        acre_area: shape_area.map(|sqft| sqft / SQFT_PER_ACRE),
        shape_length,
        shape_area,
        geometry,
        centroid,
        invalid_geometry,
        ..Property::default()
    })
}

/// WKT text of a centroid, fixed to six decimals so the synthetic identifier
/// is stable across reruns on the same geometry.
fn centroid_wkt(point: Point<f64>) -> String {
    format!("POINT ({:.6} {:.6})", point.x(), point.y())
}

fn centroid_digest(point: Point<f64>) -> String {
    hex::encode(Sha256::digest(centroid_wkt(point).as_bytes()))
}

/// Deterministic fallback identifier: "SYNTH-" plus the first 12 hex digits
/// of the centroid WKT hash, uppercased.
fn synthetic_id(point: Point<f64>) -> String {
    format!("SYNTH-{}", centroid_digest(point)[..12].to_uppercase())
}

/// Derive (city, zip) from the trailing "<city>, <state> <zip>" of an address.
fn parse_city_zip(address: &str) -> Option<(String, String)> {
    let captures = ADDRESS_TAIL.captures(address)?;
    Some((captures[1].trim().to_uppercase(), captures[2].to_string()))
}

/// Best-effort repair: rewind every ring to canonical winding. Fixes
/// orientation defects only; true self-intersections stay flagged.
fn rewind_rings(mp: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    use geo::orient::{Direction, Orient};
    mp.orient(Direction::Default)
}

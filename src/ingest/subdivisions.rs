use std::path::Path;

use anyhow::{Context, Result};
use geo::{Area, Centroid, MultiPolygon};
use shapefile::dbase::Record;
use shapefile::Shape;

use crate::config::Config;
use crate::error::Error;
use crate::geom::{shape_to_multipolygon, Reprojector};
use crate::ingest::{
    character_field, check_error_budget, check_schema, numeric_field, read_shapefile,
    IngestSummary,
};
use crate::store::Store;
use crate::types::Subdivision;

const REQUIRED_FIELDS: [&str; 4] = ["NAME", "CAMA_NAME", "SHAPE_Leng", "SHAPE_Area"];

/// Load subdivision polygons into the store, replacing the subdivision table
/// and re-running containment attribution over every property centroid.
pub fn load_subdivisions(
    store: &mut Store,
    source: &Path,
    config: &Config,
    verbose: u8,
) -> Result<IngestSummary, Error> {
    config.validate().map_err(Error::Config)?;
    let reproj = Reprojector::for_epsg(config.source_epsg).map_err(Error::Ingest)?;

    if verbose > 0 {
        eprintln!("[ingest] loading subdivisions from {}", source.display());
    }
    let rows = read_shapefile(source).map_err(Error::Ingest)?;
    check_schema(source, &rows, &REQUIRED_FIELDS).map_err(Error::Ingest)?;

    let mut summary = IngestSummary { total_rows: rows.len(), ..IngestSummary::default() };
    let mut subdivisions = Vec::with_capacity(rows.len());

    for (i, (shape, record)) in rows.into_iter().enumerate() {
        match parse_row(shape, &record, &reproj) {
            Ok(Some(subdivision)) => subdivisions.push(subdivision),
            Ok(None) => summary.skipped_placeholders += 1,
            Err(err) => {
                summary.errors += 1;
                if verbose > 1 {
                    eprintln!("[ingest] subdivision row {i}: {err:#}");
                }
            }
        }
    }

    check_error_budget(summary.errors, summary.total_rows, config.error_budget_fraction)
        .map_err(Error::Ingest)?;

    summary.loaded = subdivisions.len();
    store.commit_subdivisions(subdivisions);
    store.attribute_subdivisions();

    if verbose > 0 {
        eprintln!("[ingest] {summary}");
    }
    Ok(summary)
}

/// Convert one subdivision row. Unnamed or empty polygons are placeholders.
fn parse_row(
    shape: Shape,
    record: &Record,
    reproj: &Reprojector,
) -> Result<Option<Subdivision>> {
    let Some(name) = character_field(record, "NAME").map(|s| s.to_uppercase()) else {
        return Ok(None);
    };

    let plane = shape_to_multipolygon(shape)?;
    if plane.0.is_empty() {
        return Ok(None);
    }

    let geometry: MultiPolygon<f64> = reproj
        .plane_to_lonlat(&plane)
        .context("subdivision reprojection failed")?;

    Ok(Some(Subdivision {
        id: Default::default(),
        name,
        cama_name: character_field(record, "CAMA_NAME").map(|s| s.to_uppercase()),
        shape_length: numeric_field(record, "SHAPE_Leng").map(f64::round),
        shape_area: numeric_field(record, "SHAPE_Area")
            .or_else(|| Some(plane.unsigned_area()))
            .map(f64::round),
        centroid: geometry.centroid(),
        area: geometry.unsigned_area(),
        geometry,
    }))
}

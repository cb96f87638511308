//! Building-footprint enrichment: attribute each footprint to the parcel
//! containing its centroid, then aggregate per-parcel metrics.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use ahash::AHashMap;
use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use geo::{Area, Centroid, Coord, LineString, MultiPolygon, Polygon};
use serde_json::Value;
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Error, IngestError};
use crate::geom::{Geometries, Reprojector};
use crate::store::Store;
use crate::types::PropertyId;

/// Structured result of a building-footprint load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildingSummary {
    pub features_read: usize,
    /// Footprints whose centroid fell inside a parcel polygon.
    pub matched: usize,
    pub unmatched: usize,
    pub errors: usize,
    pub parcels_with_buildings: usize,
}

impl fmt::Display for BuildingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attributed {} of {} footprints ({} unmatched, {} errors) across {} parcels",
            self.matched, self.features_read, self.unmatched, self.errors,
            self.parcels_with_buildings,
        )
    }
}

#[derive(Default, Clone, Copy)]
struct BuildingAgg {
    count: u32,
    total_sqft: u64,
    largest_sqft: u64,
}

/// Load a building-footprint feed (GeoJSON / GeoJSONL, optionally gzipped,
/// a single file or a directory of tiles) and recompute per-parcel building
/// metrics. Parcels with no footprints receive zeroes, not absent values.
pub fn load_buildings(
    store: &mut Store,
    source: &Path,
    config: &Config,
    verbose: u8,
) -> Result<BuildingSummary, Error> {
    config.validate().map_err(Error::Config)?;
    let reproj = Reprojector::for_epsg(config.source_epsg).map_err(Error::Ingest)?;

    if verbose > 0 {
        eprintln!("[ingest] loading building footprints from {}", source.display());
    }

    // Parcel polygons indexed by table position (= PropertyId).
    let parcels = Geometries::new(
        store
            .properties()
            .iter()
            .map(|p| p.geometry.clone().unwrap_or_else(|| MultiPolygon(vec![])))
            .collect(),
    );

    let mut summary = BuildingSummary::default();
    let mut aggregates: AHashMap<u32, BuildingAgg> = AHashMap::new();

    for file in feed_files(source)? {
        for footprint in read_feed_file(&file).map_err(Error::Ingest)? {
            summary.features_read += 1;
            let building = match footprint {
                Ok(mp) => mp,
                Err(err) => {
                    summary.errors += 1;
                    if verbose > 1 {
                        eprintln!("[ingest] footprint in {}: {err:#}", file.display());
                    }
                    continue;
                }
            };

            let Some(centroid) = building.centroid() else {
                summary.errors += 1;
                continue;
            };
            // Smallest containing parcel wins if boundaries overlap.
            let Some(parcel_idx) = parcels
                .containing(centroid)
                .min_by(|&a, &b| parcels.area(a).total_cmp(&parcels.area(b)))
            else {
                summary.unmatched += 1;
                continue;
            };

            // Footprint area in the source Cartesian frame, square feet.
            let sqft = match reproj.lonlat_to_plane(&building) {
                Ok(plane) => plane.unsigned_area().round().max(0.0) as u64,
                Err(err) => {
                    summary.errors += 1;
                    if verbose > 1 {
                        eprintln!("[ingest] footprint in {}: {err:#}", file.display());
                    }
                    continue;
                }
            };

            let agg = aggregates.entry(parcel_idx as u32).or_default();
            agg.count += 1;
            agg.total_sqft += sqft;
            agg.largest_sqft = agg.largest_sqft.max(sqft);
            summary.matched += 1;
        }
    }

    super::check_error_budget(summary.errors, summary.features_read, config.error_budget_fraction)
        .map_err(Error::Ingest)?;

    summary.parcels_with_buildings = aggregates.len();
    let ids: Vec<PropertyId> = store.property_ids().collect();
    for id in ids {
        let agg = aggregates.get(&id.0).copied().unwrap_or_default();
        store
            .set_building_metrics(id, agg.count, agg.total_sqft, agg.largest_sqft)
            .map_err(Error::Store)?;
    }

    if verbose > 0 {
        eprintln!("[ingest] {summary}");
    }
    Ok(summary)
}

const FEED_EXTENSIONS: [&str; 6] =
    ["geojson", "json", "geojsonl", "ndjson", "geojsonl.gz", "ndjson.gz"];

fn is_feed_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    FEED_EXTENSIONS.iter().any(|ext| name.ends_with(&format!(".{ext}")))
}

/// Resolve the feed to a list of files: the path itself, or every feed file
/// under it when it is a directory of tiles.
fn feed_files(source: &Path) -> Result<Vec<PathBuf>, Error> {
    let unreadable = |reason: String| {
        Error::Ingest(IngestError::SourceUnreadable { path: source.to_path_buf(), reason })
    };

    if source.is_file() {
        return Ok(vec![source.to_path_buf()]);
    }
    if !source.is_dir() {
        return Err(unreadable("no such file or directory".to_string()));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(source)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_feed_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    if files.is_empty() {
        return Err(unreadable("directory contains no GeoJSON feed files".to_string()));
    }
    Ok(files)
}

/// Read one feed file into per-feature parse results. Whole-file problems
/// (unreadable, bad gzip) fail the load; per-feature problems count against
/// the error budget.
fn read_feed_file(path: &Path) -> Result<Vec<Result<MultiPolygon<f64>>>, IngestError> {
    let unreadable = |reason: String| IngestError::SourceUnreadable {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path).map_err(|e| unreadable(e.to_string()))?;
    let mut text = String::new();
    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        GzDecoder::new(file)
            .read_to_string(&mut text)
            .map_err(|e| unreadable(e.to_string()))?;
    } else {
        BufReader::new(file)
            .read_to_string(&mut text)
            .map_err(|e| unreadable(e.to_string()))?;
    }

    let trimmed = text.trim_start();
    if trimmed.starts_with('{') && trimmed.contains("\"FeatureCollection\"") {
        let value: Value =
            serde_json::from_str(trimmed).map_err(|e| unreadable(e.to_string()))?;
        let Some(features) = value["features"].as_array() else {
            return Err(unreadable("FeatureCollection without a features array".to_string()));
        };
        Ok(features.iter().map(parse_footprint).collect())
    } else {
        // GeoJSONL: one feature (or bare geometry) per line.
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                let value: Value = serde_json::from_str(line).context("unparseable line")?;
                parse_footprint(&value)
            })
            .collect())
    }
}

/// Parse a Feature or bare geometry into a MultiPolygon, uplifting polygons.
fn parse_footprint(value: &Value) -> Result<MultiPolygon<f64>> {
    let geometry = if value["type"].as_str() == Some("Feature") {
        &value["geometry"]
    } else {
        value
    };

    match geometry["type"].as_str() {
        Some("MultiPolygon") => {
            let Some(polygons) = geometry["coordinates"].as_array() else {
                bail!("MultiPolygon without coordinates");
            };
            Ok(MultiPolygon(
                polygons.iter().map(parse_polygon_rings).collect::<Result<Vec<_>>>()?,
            ))
        }
        Some("Polygon") => {
            Ok(MultiPolygon(vec![parse_polygon_rings(&geometry["coordinates"])?]))
        }
        Some(other) => bail!("unsupported footprint geometry type: {other}"),
        None => bail!("footprint without a geometry type"),
    }
}

fn parse_polygon_rings(value: &Value) -> Result<Polygon<f64>> {
    let Some(rings) = value.as_array() else {
        bail!("polygon without rings");
    };
    let mut parsed = rings.iter().map(parse_ring);
    let exterior = parsed.next().transpose()?.context("polygon without an exterior ring")?;
    let interiors = parsed.collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn parse_ring(value: &Value) -> Result<LineString<f64>> {
    let Some(points) = value.as_array() else {
        bail!("ring is not an array");
    };
    points
        .iter()
        .map(|point| {
            let coords = point.as_array().context("coordinate is not an array")?;
            match (coords.first().and_then(Value::as_f64), coords.get(1).and_then(Value::as_f64)) {
                (Some(x), Some(y)) => Ok(Coord { x, y }),
                _ => bail!("coordinate is not a [lon, lat] pair"),
            }
        })
        .collect::<Result<Vec<_>>>()
        .map(LineString)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_feature_with_a_polygon() {
        let value: Value = serde_json::from_str(
            r#"{"type":"Feature","properties":{},"geometry":{"type":"Polygon",
                "coordinates":[[[-95.9,36.1],[-95.9,36.101],[-95.899,36.101],[-95.9,36.1]]]}}"#,
        )
        .unwrap();
        let mp = parse_footprint(&value).unwrap();
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.0[0].exterior().0.len(), 4);
    }

    #[test]
    fn parses_a_bare_multipolygon() {
        let value: Value = serde_json::from_str(
            r#"{"type":"MultiPolygon","coordinates":
                [[[[0.0,0.0],[1.0,0.0],[1.0,1.0],[0.0,0.0]]]]}"#,
        )
        .unwrap();
        assert_eq!(parse_footprint(&value).unwrap().0.len(), 1);
    }

    #[test]
    fn rejects_point_features() {
        let value: Value =
            serde_json::from_str(r#"{"type":"Point","coordinates":[0.0,0.0]}"#).unwrap();
        assert!(parse_footprint(&value).is_err());
    }

    #[test]
    fn feed_extension_matching() {
        assert!(is_feed_file(Path::new("tile_001.geojsonl.gz")));
        assert!(is_feed_file(Path::new("buildings.geojson")));
        assert!(!is_feed_file(Path::new("readme.txt")));
        assert!(!is_feed_file(Path::new("archive.gz")));
    }
}

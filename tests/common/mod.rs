//! Shared fixtures: in-code parcel grids around a fictional county seat.

use chrono::NaiveDate;
use geo::{polygon, MultiPolygon, Point};
use taxdown::{Property, Store};

pub const SUBDIVISION: &str = "MAPLE RIDGE";

/// A small lon/lat lot polygon at the given centroid.
pub fn lot_geometry(lon: f64, lat: f64) -> MultiPolygon<f64> {
    let d = 0.0002;
    MultiPolygon(vec![polygon![
        (x: lon - d, y: lat - d),
        (x: lon + d, y: lat - d),
        (x: lon + d, y: lat + d),
        (x: lon - d, y: lat + d),
        (x: lon - d, y: lat - d),
    ]])
}

/// One residential parcel with the given totals (in dollars) and ratio.
pub fn parcel(
    id: &str,
    subdivision: Option<&str>,
    lon: f64,
    total_dollars: i64,
    ratio: f64,
    acres: f64,
) -> Property {
    let total_cents = total_dollars * 100;
    Property {
        parcel_id: Some(id.to_string()),
        subdivision_name: subdivision.map(str::to_string),
        property_type: Some("RI".into()),
        str_token: Some("17-18-14".into()),
        total_value_cents: Some(total_cents),
        assessed_value_cents: Some((total_cents as f64 * ratio).round() as i64),
        acre_area: Some(acres),
        centroid: Some(Point::new(lon, 36.10)),
        geometry: Some(lot_geometry(lon, 36.10)),
        quality_score: 100,
        ..Property::default()
    }
}

pub fn store_with(rows: Vec<Property>) -> Store {
    let mut store = Store::new();
    store.commit_properties(rows).unwrap();
    store
}

pub fn date() -> NaiveDate {
    "2026-08-01".parse().unwrap()
}

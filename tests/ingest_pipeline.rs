//! Ingest end-to-end: real shapefiles in a state-plane frame, synthetic
//! identifiers, dedup, subdivision attribution, building enrichment.

use std::io::Write;
use std::path::{Path, PathBuf};

use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::{Point, Polygon, PolygonRing, Writer};
use taxdown::{load_buildings, load_properties, load_subdivisions, Config, Error, IngestError, Store};

/// Clockwise square ring in source-plane feet (Shapefile exterior winding).
fn plane_square(x0: f64, y0: f64, side: f64) -> Vec<Point> {
    vec![
        Point::new(x0, y0),
        Point::new(x0, y0 + side),
        Point::new(x0 + side, y0 + side),
        Point::new(x0 + side, y0),
        Point::new(x0, y0),
    ]
}

/// Downtown-Tulsa-ish corner of the Oklahoma North state-plane grid.
const BASE_X: f64 = 2_575_000.0;
const BASE_Y: f64 = 406_000.0;

struct ParcelRow {
    parcel_id: Option<&'static str>,
    owner: Option<&'static str>,
    address: Option<&'static str>,
    total: Option<f64>,
    offset_ft: f64,
}

fn write_parcels(dir: &Path, rows: &[ParcelRow]) -> PathBuf {
    let path = dir.join("parcels.shp");
    let table = TableWriterBuilder::new()
        .add_character_field(FieldName::try_from("PARCEL_ID").unwrap(), 24)
        .add_character_field(FieldName::try_from("OWNER_NAME").unwrap(), 40)
        .add_character_field(FieldName::try_from("OWNER_ADDR").unwrap(), 60)
        .add_character_field(FieldName::try_from("SITE_ADDR").unwrap(), 60)
        .add_character_field(FieldName::try_from("PROP_TYPE").unwrap(), 4)
        .add_numeric_field(FieldName::try_from("LAND_VAL").unwrap(), 12, 0)
        .add_numeric_field(FieldName::try_from("IMPR_VAL").unwrap(), 12, 0)
        .add_numeric_field(FieldName::try_from("ASSD_VAL").unwrap(), 12, 0)
        .add_numeric_field(FieldName::try_from("TOTAL_VAL").unwrap(), 12, 0)
        .add_character_field(FieldName::try_from("STR").unwrap(), 12)
        .add_character_field(FieldName::try_from("SCHOOL").unwrap(), 12)
        .add_character_field(FieldName::try_from("SUBDIV").unwrap(), 40)
        .add_numeric_field(FieldName::try_from("SHAPE_Leng").unwrap(), 12, 2)
        .add_numeric_field(FieldName::try_from("SHAPE_Area").unwrap(), 14, 2);

    let mut writer = Writer::from_path(&path, table).unwrap();
    for row in rows {
        let polygon =
            Polygon::with_rings(vec![PolygonRing::Outer(plane_square(
                BASE_X + row.offset_ft,
                BASE_Y,
                150.0,
            ))]);

        let mut record = Record::default();
        let text = |v: Option<&str>| FieldValue::Character(v.map(String::from));
        record.insert("PARCEL_ID".to_string(), text(row.parcel_id));
        record.insert("OWNER_NAME".to_string(), text(row.owner));
        record.insert("OWNER_ADDR".to_string(), text(row.owner.map(|_| "PO BOX 1, TULSA, OK 74101")));
        record.insert("SITE_ADDR".to_string(), text(row.address));
        record.insert("PROP_TYPE".to_string(), text(Some("ri")));
        record.insert("LAND_VAL".to_string(), FieldValue::Numeric(row.total.map(|t| t * 0.2)));
        record.insert("IMPR_VAL".to_string(), FieldValue::Numeric(row.total.map(|t| t * 0.8)));
        record.insert("ASSD_VAL".to_string(), FieldValue::Numeric(row.total.map(|t| t * 0.2)));
        record.insert("TOTAL_VAL".to_string(), FieldValue::Numeric(row.total));
        record.insert("STR".to_string(), text(Some("17-18-14")));
        record.insert("SCHOOL".to_string(), text(Some("I-001")));
        record.insert("SUBDIV".to_string(), text(Some("Maple Ridge")));
        record.insert("SHAPE_Leng".to_string(), FieldValue::Numeric(Some(600.0)));
        record.insert("SHAPE_Area".to_string(), FieldValue::Numeric(Some(22_500.0)));
        writer.write_shape_and_record(&polygon, &record).unwrap();
    }
    path
}

fn write_subdivisions(dir: &Path) -> PathBuf {
    let path = dir.join("subdivisions.shp");
    let table = TableWriterBuilder::new()
        .add_character_field(FieldName::try_from("NAME").unwrap(), 40)
        .add_character_field(FieldName::try_from("CAMA_NAME").unwrap(), 60)
        .add_numeric_field(FieldName::try_from("SHAPE_Leng").unwrap(), 12, 2)
        .add_numeric_field(FieldName::try_from("SHAPE_Area").unwrap(), 14, 2);

    let mut writer = Writer::from_path(&path, table).unwrap();
    // Covers the first parcel square but not the ones further east.
    let polygon =
        Polygon::with_rings(vec![PolygonRing::Outer(plane_square(BASE_X - 50.0, BASE_Y - 50.0, 400.0))]);
    let mut record = Record::default();
    record.insert("NAME".to_string(), FieldValue::Character(Some("Maple Ridge".into())));
    record.insert("CAMA_NAME".to_string(), FieldValue::Character(Some("MAPLE RIDGE - TULSA".into())));
    record.insert("SHAPE_Leng".to_string(), FieldValue::Numeric(Some(1_600.0)));
    record.insert("SHAPE_Area".to_string(), FieldValue::Numeric(Some(160_000.0)));
    writer.write_shape_and_record(&polygon, &record).unwrap();
    path
}

fn standard_rows() -> Vec<ParcelRow> {
    vec![
        ParcelRow {
            parcel_id: Some("10021"),
            owner: Some("SMITH JOHN"),
            address: Some("100 MAIN ST, TULSA, OK 74103"),
            total: Some(250_000.0),
            offset_ft: 0.0,
        },
        // No county code: gets a deterministic synthetic identifier.
        ParcelRow {
            parcel_id: None,
            owner: Some("DOE JANE"),
            address: Some("104 MAIN ST, TULSA, OK 74103"),
            total: Some(240_000.0),
            offset_ft: 500.0,
        },
        // Byte-duplicate of the first row.
        ParcelRow {
            parcel_id: Some("10021"),
            owner: Some("SMITH JOHN"),
            address: Some("100 MAIN ST, TULSA, OK 74103"),
            total: Some(250_000.0),
            offset_ft: 0.0,
        },
        // Empty placeholder.
        ParcelRow {
            parcel_id: None,
            owner: None,
            address: None,
            total: Some(0.0),
            offset_ft: 2_000.0,
        },
    ]
}

#[test]
fn ingest_normalizes_dedups_and_attributes() {
    let dir = tempfile::tempdir().unwrap();
    let parcels = write_parcels(dir.path(), &standard_rows());
    let subdivisions = write_subdivisions(dir.path());

    let mut store = Store::new();
    let config = Config::default();

    let summary = load_properties(&mut store, &parcels, &config, 0).unwrap();
    assert_eq!(summary.total_rows, 4);
    assert_eq!(summary.loaded, 2);
    assert_eq!(summary.skipped_placeholders, 1);
    assert_eq!(summary.deduplicated, 1);
    assert_eq!(summary.synthetic_ids, 1);
    assert_eq!(summary.errors, 0);

    // Normalization: tokens upcased, dollars to cents, city/zip derived.
    let id = store.resolve_parcel("10021").unwrap();
    let property = store.property(id).unwrap();
    assert_eq!(property.property_type.as_deref(), Some("RI"));
    assert_eq!(property.subdivision_name.as_deref(), Some("MAPLE RIDGE"));
    assert_eq!(property.total_value_cents, Some(25_000_000));
    assert_eq!(property.assessed_value_cents, Some(5_000_000));
    assert_eq!(property.city.as_deref(), Some("TULSA"));
    assert_eq!(property.zip.as_deref(), Some("74103"));
    assert!((property.acre_area.unwrap() - 22_500.0 / 43_560.0).abs() < 1e-9);
    assert_eq!(property.quality_score, 100);

    // Synthetic identifier: well-formed, quality capped at 50.
    let synthetic = store
        .properties()
        .iter()
        .find(|p| p.is_synthetic())
        .expect("one synthetic row");
    let synthetic_id = synthetic.effective_parcel_id().to_string();
    assert!(synthetic_id.starts_with("SYNTH-"));
    assert_eq!(synthetic_id.len(), "SYNTH-".len() + 12);
    assert!(synthetic.quality_score <= 50);

    // Identifier invariants over the whole corpus.
    let mut effective: Vec<&str> =
        store.properties().iter().map(|p| p.effective_parcel_id()).collect();
    assert!(effective.iter().all(|id| !id.is_empty()));
    effective.sort_unstable();
    effective.dedup();
    assert_eq!(effective.len(), store.property_count());

    // Spatial subdivision attribution after the subdivision load.
    load_subdivisions(&mut store, &subdivisions, &config, 0).unwrap();
    let property = store.property(id).unwrap();
    assert!(property.subdivision.is_some());
    let far = store.properties().iter().find(|p| p.is_synthetic()).unwrap();
    assert!(far.subdivision.is_none(), "500 ft east sits outside the plat");
}

#[test]
fn reingest_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let parcels = write_parcels(dir.path(), &standard_rows());
    let config = Config::default();

    let mut first = Store::new();
    let first_summary = load_properties(&mut first, &parcels, &config, 0).unwrap();
    let mut second = Store::new();
    let second_summary = load_properties(&mut second, &parcels, &config, 0).unwrap();

    assert_eq!(first_summary, second_summary);
    assert_eq!(first.property_count(), second.property_count());
    for (a, b) in first.properties().iter().zip(second.properties()) {
        assert_eq!(a.effective_parcel_id(), b.effective_parcel_id());
        assert_eq!(a.total_value_cents, b.total_value_cents);
        assert_eq!(a.centroid, b.centroid);
        assert_eq!(a.quality_score, b.quality_score);
    }
}

#[test]
fn building_footprints_aggregate_per_parcel() {
    let dir = tempfile::tempdir().unwrap();
    let parcels = write_parcels(dir.path(), &standard_rows());

    let mut store = Store::new();
    let config = Config::default();
    load_properties(&mut store, &parcels, &config, 0).unwrap();

    // Two footprints around the first parcel's centroid, written in lon/lat.
    let id = store.resolve_parcel("10021").unwrap();
    let centroid = store.property(id).unwrap().centroid.unwrap();
    let feed = dir.path().join("buildings.geojsonl");
    let mut file = std::fs::File::create(&feed).unwrap();
    for (dx, size) in [(0.0, 0.00008), (0.0001, 0.00004)] {
        let (x, y) = (centroid.x() + dx, centroid.y());
        writeln!(
            file,
            r#"{{"type":"Feature","properties":{{}},"geometry":{{"type":"Polygon","coordinates":[[[{x0},{y0}],[{x1},{y0}],[{x1},{y1}],[{x0},{y1}],[{x0},{y0}]]]}}}}"#,
            x0 = x - size,
            y0 = y - size,
            x1 = x + size,
            y1 = y + size,
        )
        .unwrap();
    }

    let summary = load_buildings(&mut store, &feed, &config, 0).unwrap();
    assert_eq!(summary.features_read, 2);
    assert_eq!(summary.matched, 2);
    assert_eq!(summary.parcels_with_buildings, 1);

    let property = store.property(id).unwrap();
    assert_eq!(property.building_count, 2);
    assert!(property.total_building_sqft > 0);
    assert!(property.largest_building_sqft <= property.total_building_sqft);
    assert!(property.largest_building_sqft > property.total_building_sqft / 2);

    // Parcels without footprints keep zeroes, not absent values.
    let empty = store.properties().iter().find(|p| p.is_synthetic()).unwrap();
    assert_eq!(empty.building_count, 0);
    assert_eq!(empty.total_building_sqft, 0);
}

#[test]
fn schema_mismatch_aborts_the_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.shp");
    let table = TableWriterBuilder::new()
        .add_character_field(FieldName::try_from("GEOID").unwrap(), 24);
    let mut writer = Writer::from_path(&path, table).unwrap();
    let polygon = Polygon::with_rings(vec![PolygonRing::Outer(plane_square(BASE_X, BASE_Y, 150.0))]);
    let mut record = Record::default();
    record.insert("GEOID".to_string(), FieldValue::Character(Some("x".into())));
    writer.write_shape_and_record(&polygon, &record).unwrap();

    let mut store = Store::new();
    match load_properties(&mut store, &path, &Config::default(), 0) {
        Err(Error::Ingest(IngestError::SchemaMismatch { field, .. })) => {
            assert_eq!(field, "PARCEL_ID");
        }
        other => panic!("expected SchemaMismatch, got {other:?}"),
    }
    assert_eq!(store.property_count(), 0);
}

#[test]
fn unsupported_crs_aborts_the_load() {
    let mut store = Store::new();
    let config = Config { source_epsg: 3857, ..Config::default() };
    match load_properties(&mut store, Path::new("anything.shp"), &config, 0) {
        Err(Error::Ingest(IngestError::CrsMismatch { epsg })) => assert_eq!(epsg, 3857),
        other => panic!("expected CrsMismatch, got {other:?}"),
    }
}

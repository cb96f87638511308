//! Ingest / enrichment: turns raw cadastral geometry and building footprints
//! into the analysis corpus.

mod buildings;
mod parcels;
mod quality;
mod subdivisions;

use std::fmt;
use std::path::Path;

use shapefile::dbase::{FieldValue, Record};
use shapefile::{Reader, Shape};

use crate::error::IngestError;

pub use buildings::{load_buildings, BuildingSummary};
pub use parcels::load_properties;
pub use subdivisions::load_subdivisions;

/// Structured result of one ingest load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Rows present in the source.
    pub total_rows: usize,
    /// Rows materialized into the store.
    pub loaded: usize,
    /// Empty placeholder rows dropped (no id, no address, no owner, no value).
    pub skipped_placeholders: usize,
    /// Duplicate rows dropped in favor of the smallest internal id.
    pub deduplicated: usize,
    /// Rows whose polygon is self-intersecting (tolerated, flagged).
    pub invalid_geometries: usize,
    /// Rows that received a synthetic parcel identifier.
    pub synthetic_ids: usize,
    /// Bad rows skipped and counted against the error budget.
    pub errors: usize,
}

impl fmt::Display for IngestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "loaded {} of {} rows (placeholders {}, duplicates {}, invalid geometries {}, synthetic ids {}, errors {})",
            self.loaded,
            self.total_rows,
            self.skipped_placeholders,
            self.deduplicated,
            self.invalid_geometries,
            self.synthetic_ids,
            self.errors,
        )
    }
}

/// Abort the load when bad rows exceed the budget fraction.
pub(crate) fn check_error_budget(
    errors: usize,
    total: usize,
    budget_fraction: f64,
) -> Result<(), IngestError> {
    if total > 0 && (errors as f64) > budget_fraction * total as f64 {
        return Err(IngestError::ErrorBudgetExceeded {
            errors,
            total,
            budget: budget_fraction * 100.0,
        });
    }
    Ok(())
}

/// Reads all shapes + attribute records from a given `.shp` file path.
pub(crate) fn read_shapefile(path: &Path) -> Result<Vec<(Shape, Record)>, IngestError> {
    let unreadable = |reason: String| IngestError::SourceUnreadable {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = Reader::from_path(path).map_err(|e| unreadable(e.to_string()))?;
    let mut items = Vec::new();
    for result in reader.iter_shapes_and_records() {
        items.push(result.map_err(|e| unreadable(e.to_string()))?);
    }
    Ok(items)
}

/// Error unless the first record's schema carries every required field.
pub(crate) fn check_schema(
    path: &Path,
    records: &[(Shape, Record)],
    required: &[&'static str],
) -> Result<(), IngestError> {
    let Some((_, first)) = records.first() else { return Ok(()) };
    for &field in required {
        if first.get(field).is_none() {
            return Err(IngestError::SchemaMismatch { path: path.to_path_buf(), field });
        }
    }
    Ok(())
}

/// Get a trimmed character field from a record; empty strings become None.
pub(crate) fn character_field(record: &Record, field: &str) -> Option<String> {
    match record.get(field) {
        Some(FieldValue::Character(Some(s))) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        _ => None,
    }
}

/// Get a numeric field from a record, tolerating the dbase numeric flavors.
pub(crate) fn numeric_field(record: &Record, field: &str) -> Option<f64> {
    match record.get(field) {
        Some(FieldValue::Numeric(Some(n))) => Some(*n),
        Some(FieldValue::Float(Some(n))) => Some(*n as f64),
        Some(FieldValue::Integer(n)) => Some(*n as f64),
        Some(FieldValue::Double(n)) => Some(*n),
        _ => None,
    }
}

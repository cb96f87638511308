use std::path::PathBuf;

/// Top-level error type for the analysis core.
///
/// Variants group into the kinds callers dispatch on: input errors surface
/// immediately, data errors are recorded per-item in batch runs, store errors
/// are retried once, config and ingest errors abort the operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The given parcel identifier resolves to no stored property.
    #[error("property not found: {0:?}")]
    PropertyNotFound(String),

    /// The given parcel identifier is empty or not a plausible county code.
    #[error("malformed parcel id: {0:?}")]
    MalformedParcelId(String),

    /// The target property is missing an attribute the analysis requires.
    #[error("insufficient data for {parcel:?}: missing {missing}")]
    InsufficientData { parcel: String, missing: &'static str },

    /// The target could not be scored: non-positive total value or no peers.
    #[error("unscoreable parcel {parcel:?}: {reason}")]
    Unscoreable { parcel: String, reason: &'static str },

    /// The caller-supplied deadline elapsed; nothing was persisted.
    #[error("operation cancelled before completion")]
    Cancelled,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl Error {
    /// True for errors a batch run records per-item and continues past.
    pub fn is_data_error(&self) -> bool {
        matches!(self, Error::InsufficientData { .. } | Error::Unscoreable { .. })
    }

    /// True for errors caused by the caller's input rather than stored data.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Error::PropertyNotFound(_) | Error::MalformedParcelId(_))
    }
}

/// Failures of the geometry store itself (I/O, corruption, broken invariants).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store table error: {0}")]
    Table(String),

    #[error("corrupt pack: {0}")]
    Corrupt(String),

    /// A stored row violates an invariant the analyzer relies on.
    #[error("store invariant violated: {0}")]
    Invariant(String),
}

/// A configuration option is out of its documented range.
#[derive(Debug, thiserror::Error)]
#[error("config option {option} out of range: {value} ({hint})")]
pub struct ConfigError {
    pub option: &'static str,
    pub value: String,
    pub hint: &'static str,
}

impl ConfigError {
    pub(crate) fn new(option: &'static str, value: impl ToString, hint: &'static str) -> Self {
        Self { option, value: value.to_string(), hint }
    }
}

/// Failures that abort an ingest load transactionally.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("source unreadable: {path}: {reason}")]
    SourceUnreadable { path: PathBuf, reason: String },

    /// The source table lacks a field the load contract requires.
    #[error("schema mismatch in {path}: missing field {field:?}")]
    SchemaMismatch { path: PathBuf, field: &'static str },

    /// No documented transform exists for the source coordinate system.
    #[error("unsupported source coordinate system: EPSG {epsg}")]
    CrsMismatch { epsg: u32 },

    /// Too many bad rows: the load rolled back to the prior store state.
    #[error("error budget exceeded: {errors} bad rows of {total} (budget {budget:.2}%)")]
    ErrorBudgetExceeded { errors: usize, total: usize, budget: f64 },
}

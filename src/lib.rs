#![doc = "Taxdown public API"]

mod analyzer;
mod common;
mod comps;
mod config;
mod error;
mod fairness;
mod geom;
mod ingest;
mod savings;
mod store;
mod types;

#[doc(inline)]
pub use types::{
    Analysis, AnalysisParameters, Cents, FairnessBand, Methodology, Property, PropertyId,
    Recommendation, Subdivision, SubdivisionId,
};

#[doc(inline)]
pub use config::{Config, FairnessThresholds, SavingsThresholds};

#[doc(inline)]
pub use error::{ConfigError, Error, IngestError, StoreError};

#[doc(inline)]
pub use store::{AuditRecord, AuditReason, Store};

#[doc(inline)]
pub use ingest::{load_buildings, load_properties, load_subdivisions, BuildingSummary, IngestSummary};

#[doc(inline)]
pub use comps::{find_comparables, Comparable, MatchTier};

#[doc(inline)]
pub use fairness::{score_fairness, FairnessOutcome, PeerStats};

#[doc(inline)]
pub use savings::{estimate_savings, SavingsEstimate};

#[doc(inline)]
pub use analyzer::{
    analyze, analyze_all, analyze_batch, find_appeal_candidates, get_latest_analysis,
    save_analysis, score_parcel, AnalyzeOptions, BatchOptions, BatchOutcome, BatchSummary,
    ProgressFn,
};

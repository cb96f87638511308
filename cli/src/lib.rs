pub mod cli;
pub mod commands;

use std::process::ExitCode;

use taxdown::{Error, IngestError};

/// Map a failed run to its documented exit code: 2 for error-budget
/// exceedance, 1 for everything else (schema mismatch, usage, data).
pub fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<Error>() {
        Some(Error::Ingest(IngestError::ErrorBudgetExceeded { .. })) => ExitCode::from(2),
        _ => ExitCode::from(1),
    }
}

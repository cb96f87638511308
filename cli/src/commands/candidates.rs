use anyhow::Result;
use taxdown::find_appeal_candidates;

use crate::cli::{CandidatesArgs, Cli};
use crate::commands::{load_config, open_store};

pub fn run(cli: &Cli, args: &CandidatesArgs) -> Result<()> {
    load_config(cli)?;
    let store = open_store(&cli.store)?;

    let candidates = find_appeal_candidates(&store, args.min_score, args.limit);
    println!(
        "[candidates] {} parcels at fairness >= {} (best savings first)",
        candidates.len(),
        args.min_score,
    );

    for analysis in candidates {
        let parcel = store
            .property(analysis.property)
            .map(|p| p.effective_parcel_id().to_string())
            .unwrap_or_else(|| analysis.property.to_string());
        println!(
            "{parcel}\tfairness {}\tconfidence {}\t${:.2}/yr\t{}",
            analysis.fairness_score,
            analysis.confidence,
            analysis.estimated_savings_cents as f64 / 100.0,
            analysis.recommendation,
        );
    }
    Ok(())
}

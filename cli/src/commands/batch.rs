use anyhow::Result;
use taxdown::{analyze_all, BatchOptions};

use crate::cli::{BatchArgs, Cli};
use crate::commands::{load_config, open_store, save_store};

pub fn run(cli: &Cli, args: &BatchArgs) -> Result<()> {
    let config = load_config(cli)?;
    let mut store = open_store(&cli.store)?;

    println!(
        "[batch] analyzing {} parcels with {} workers",
        store.property_count().saturating_sub(args.offset),
        config.worker_count,
    );

    let options = BatchOptions { verbose: cli.verbose.max(1), ..BatchOptions::default() };
    let summary =
        analyze_all(&mut store, &config, args.offset, args.min_quality, &options, None)?;
    println!("[batch] {summary}");

    save_store(&store, &cli.store, cli.verbose)
}

use anyhow::Result;
use taxdown::load_subdivisions;

use crate::cli::{Cli, LoadArgs};
use crate::commands::{load_config, open_store, save_store};

pub fn run(cli: &Cli, args: &LoadArgs) -> Result<()> {
    let config = load_config(cli)?;
    let mut store = open_store(&cli.store)?;

    println!("[load-subdivisions] loading subdivisions from {}", args.source.display());
    let summary = load_subdivisions(&mut store, &args.source, &config, cli.verbose)?;
    println!("[load-subdivisions] {summary}");

    save_store(&store, &cli.store, cli.verbose)
}

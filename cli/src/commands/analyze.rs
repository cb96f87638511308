use anyhow::Result;
use taxdown::{analyze, AnalyzeOptions};

use crate::cli::{AnalyzeArgs, Cli};
use crate::commands::{load_config, open_store, save_store};

pub fn run(cli: &Cli, args: &AnalyzeArgs) -> Result<()> {
    let config = load_config(cli)?;
    let mut store = open_store(&cli.store)?;

    let options = AnalyzeOptions { fail_soft: args.fail_soft, ..AnalyzeOptions::default() };
    match analyze(&mut store, &config, &args.parcel_id, &options)? {
        Some(analysis) => {
            println!("{}", serde_json::to_string_pretty(&analysis)?);
            save_store(&store, &cli.store, cli.verbose)
        }
        None => {
            println!("[analyze] parcel {} cannot be scored", args.parcel_id);
            Ok(())
        }
    }
}

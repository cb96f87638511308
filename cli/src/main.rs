use std::process::ExitCode;

use clap::Parser;

use taxdown_cli::cli::{Cli, Commands};
use taxdown_cli::commands::{analyze, batch, candidates, load_buildings, load_properties, load_subdivisions};
use taxdown_cli::exit_code_for;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match &cli.command {
        Commands::LoadProperties(args) => load_properties::run(&cli, args),
        Commands::LoadSubdivisions(args) => load_subdivisions::run(&cli, args),
        Commands::LoadBuildings(args) => load_buildings::run(&cli, args),
        Commands::Analyze(args) => analyze::run(&cli, args),
        Commands::Batch(args) => batch::run(&cli, args),
        Commands::Candidates(args) => candidates::run(&cli, args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_code_for(&err)
        }
    }
}

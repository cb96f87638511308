use std::path::PathBuf;

/// Property-tax analysis CLI (argument schema only)
#[derive(clap::Parser, Debug)]
#[command(name = "taxdown", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Store pack directory
    #[arg(long, value_hint = clap::ValueHint::DirPath, default_value = "./taxdown.pack")]
    pub store: PathBuf,

    /// Configuration file (JSON); defaults apply when omitted
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Load parcel polygons into the store
    LoadProperties(LoadArgs),

    /// Load subdivision polygons into the store
    LoadSubdivisions(LoadArgs),

    /// Load building footprints and recompute per-parcel metrics
    LoadBuildings(LoadArgs),

    /// Analyze a single parcel and print the result as JSON
    Analyze(AnalyzeArgs),

    /// Analyze the whole county in batches
    Batch(BatchArgs),

    /// List appeal candidates from the latest analyses
    Candidates(CandidatesArgs),
}

#[derive(clap::Args, Debug)]
pub struct LoadArgs {
    /// Source path (.shp for parcels/subdivisions, GeoJSON feed for buildings)
    #[arg(long, value_hint = clap::ValueHint::AnyPath)]
    pub source: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct AnalyzeArgs {
    /// County or synthetic parcel identifier
    pub parcel_id: String,

    /// Return quietly instead of failing when the parcel cannot be scored
    #[arg(long)]
    pub fail_soft: bool,
}

#[derive(clap::Args, Debug)]
pub struct BatchArgs {
    /// Skip parcels below this data-quality score
    #[arg(long, default_value_t = 0)]
    pub min_quality: u8,

    /// Resume from this offset into the parcel table
    #[arg(long, default_value_t = 0)]
    pub offset: usize,
}

#[derive(clap::Args, Debug)]
pub struct CandidatesArgs {
    /// Minimum fairness score
    #[arg(long, default_value_t = 60)]
    pub min_score: u8,

    /// Maximum candidates listed
    #[arg(long, default_value_t = 50)]
    pub limit: usize,
}

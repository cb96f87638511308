pub mod analyze;
pub mod batch;
pub mod candidates;
pub mod load_buildings;
pub mod load_properties;
pub mod load_subdivisions;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use taxdown::{Config, Store};

use crate::cli::Cli;

/// Load the configuration file when given, defaults otherwise.
pub(crate) fn load_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => Config::default(),
    };
    config.validate().map_err(taxdown::Error::Config)?;
    Ok(config)
}

/// Open the store pack, or start empty when the directory does not exist yet.
pub(crate) fn open_store(path: &Path) -> Result<Store> {
    if path.exists() {
        Ok(Store::load(path).map_err(taxdown::Error::Store)?)
    } else {
        Ok(Store::new())
    }
}

/// Persist the store pack after a mutating command.
pub(crate) fn save_store(store: &Store, path: &Path, verbose: u8) -> Result<()> {
    store.save(path).map_err(taxdown::Error::Store)?;
    if verbose > 0 {
        eprintln!("[store] saved pack to {}", path.display());
    }
    Ok(())
}

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::StoreError;
use crate::geom::STORAGE_EPSG;

const MANIFEST_FILE: &str = "manifest.json";
const PACK_VERSION: &str = "1";

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct FileHash {
    pub sha256: String,
}

/// Pack manifest: coordinate system, table counts, and per-file content
/// hashes, so a saved store can be verified before use.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Manifest {
    version: String,
    crs: String,
    counts: BTreeMap<String, usize>,
    files: BTreeMap<String, FileHash>,
}

impl Manifest {
    /// Build a manifest over the given table files in `dir`, hashing each.
    pub(crate) fn new(
        dir: &Path,
        counts: BTreeMap<&'static str, usize>,
        files: &[&str],
    ) -> Result<Self, StoreError> {
        let mut hashes = BTreeMap::new();
        for &file in files {
            hashes.insert(file.to_string(), FileHash { sha256: sha256_file(&dir.join(file))? });
        }
        Ok(Self {
            version: PACK_VERSION.to_string(),
            crs: format!("EPSG:{STORAGE_EPSG}"),
            counts: counts.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            files: hashes,
        })
    }

    pub(crate) fn write(&self, dir: &Path) -> Result<(), StoreError> {
        let path = dir.join(MANIFEST_FILE);
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| StoreError::Corrupt(format!("manifest serialization failed: {e}")))?;
        fs::write(&path, json).map_err(|source| StoreError::Io { path, source })
    }

    pub(crate) fn read(dir: &Path) -> Result<Self, StoreError> {
        let path = dir.join(MANIFEST_FILE);
        let bytes = fs::read(&path).map_err(|source| StoreError::Io { path: path.clone(), source })?;
        let manifest: Manifest = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Corrupt(format!("unreadable manifest: {e}")))?;
        if manifest.crs != format!("EPSG:{STORAGE_EPSG}") {
            return Err(StoreError::Corrupt(format!(
                "pack stored in {}, expected EPSG:{STORAGE_EPSG}",
                manifest.crs
            )));
        }
        Ok(manifest)
    }

    /// Recompute every file hash and compare against the manifest.
    pub(crate) fn verify(&self, dir: &Path) -> Result<(), StoreError> {
        for (file, expected) in &self.files {
            let actual = sha256_file(&dir.join(file))?;
            if actual != expected.sha256 {
                return Err(StoreError::Corrupt(format!("hash mismatch for {file}")));
            }
        }
        Ok(())
    }
}

/// Hex sha256 of a file's contents.
fn sha256_file(path: &Path) -> Result<String, StoreError> {
    let bytes =
        fs::read(path).map_err(|source| StoreError::Io { path: path.to_path_buf(), source })?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

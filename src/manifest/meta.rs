//! Build metadata side channel.
//!
//! The transformer works on source files; chunk names only exist once
//! bundling finishes. `meta.json` carries the `original file -> compiled
//! chunk` mapping between the two phases so the client cleanup pass can find
//! the chunks that contain identity arguments. Removed at the end of the
//! build.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const META_FILE: &str = "meta.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuildMeta {
    /// Original route file -> emitted chunk file.
    pub route_files: BTreeMap<String, String>,
}

fn meta_path(build_dir: &Path) -> PathBuf {
    build_dir.join(META_FILE)
}

/// Merge `meta` into the metadata file (creating it if needed).
pub fn write_meta(build_dir: &Path, meta: &BuildMeta) -> Result<()> {
    let mut merged = read_meta(build_dir);
    merged
        .route_files
        .extend(meta.route_files.iter().map(|(k, v)| (k.clone(), v.clone())));

    let path = meta_path(build_dir);
    fs::write(&path, serde_json::to_string_pretty(&merged)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Read build metadata; a missing or unreadable file is just empty.
pub fn read_meta(build_dir: &Path) -> BuildMeta {
    fs::read_to_string(meta_path(build_dir))
        .ok()
        .and_then(|content| serde_json::from_str(&content).ok())
        .unwrap_or_default()
}

/// Remove the metadata file; it never ships.
pub fn remove_meta(build_dir: &Path) {
    let _ = fs::remove_file(meta_path(build_dir));
}

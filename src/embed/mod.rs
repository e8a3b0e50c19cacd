//! Embedded runtime assets.
//!
//! The lazy-route normalizer is the only runtime JavaScript this crate
//! ships. It is minified by `build.rs` and written into the client build
//! directory so the host bundler can alias
//! [`crate::transform::HELPER_SPECIFIER`] to it.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Minified lazy-route normalizer injected into route files by the
/// transformer.
pub const NORMALIZE_ROUTE_JS: &str =
    include_str!(concat!(env!("OUT_DIR"), "/normalize-route.min.js"));

/// File name the helper is emitted under.
pub const NORMALIZE_ROUTE_FILE: &str = "normalize-route.js";

/// Write embedded runtime assets into `output_dir`, returning the helper's
/// emitted path.
pub fn write_embedded_assets(output_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let path = output_dir.join(NORMALIZE_ROUTE_FILE);
    fs::write(&path, NORMALIZE_ROUTE_JS)
        .with_context(|| format!("failed to write {}", path.display()))?;

    Ok(path)
}

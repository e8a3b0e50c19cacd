//! Injectable manifest cache.
//!
//! The manifest is read-only after load, but the cache itself has an
//! explicit `init`/`reset` lifecycle owned by the server bootstrap and is
//! handed into the render path - no process-wide singleton, so tests get
//! isolated instances.

use super::builder::RouteManifest;
use super::AssetDescriptor;
use anyhow::Result;
use arc_swap::ArcSwap;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct ManifestCache {
    manifest: ArcSwap<RouteManifest>,
}

impl ManifestCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the persisted manifest from the server build directory.
    /// Replaces whatever was loaded before.
    pub fn init(&self, server_dir: &Path) -> Result<()> {
        let manifest = RouteManifest::load(server_dir)?;
        self.manifest.store(Arc::new(manifest));
        Ok(())
    }

    /// Install an already-built manifest (tests, in-process builds).
    pub fn install(&self, manifest: RouteManifest) {
        self.manifest.store(Arc::new(manifest));
    }

    /// Drop the loaded manifest.
    pub fn reset(&self) {
        self.manifest.store(Arc::new(RouteManifest::default()));
    }

    /// Merged, sorted, deduplicated assets for a matched route set.
    pub fn assets_for(&self, route_ids: &[String]) -> Vec<AssetDescriptor> {
        self.manifest.load().assets_for(route_ids)
    }

    pub fn manifest(&self) -> Arc<RouteManifest> {
        self.manifest.load_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{AssetKind, ENTRY_WEIGHT};
    use std::collections::BTreeMap;

    fn sample() -> RouteManifest {
        let mut map = BTreeMap::new();
        map.insert(
            "0".to_string(),
            vec![AssetDescriptor {
                kind: AssetKind::Script,
                url: "/assets/home.js".into(),
                weight: ENTRY_WEIGHT,
                is_nested: false,
                is_preload: false,
                content: None,
            }],
        );
        RouteManifest(map)
    }

    #[test]
    fn test_init_reads_persisted_manifest() {
        let dir = tempfile::tempdir().unwrap();
        sample().write(dir.path()).unwrap();

        let cache = ManifestCache::new();
        cache.init(dir.path()).unwrap();
        assert_eq!(cache.assets_for(&["0".to_string()]).len(), 1);
    }

    #[test]
    fn test_reset_clears_state() {
        let cache = ManifestCache::new();
        cache.install(sample());
        assert!(!cache.assets_for(&["0".to_string()]).is_empty());

        cache.reset();
        assert!(cache.assets_for(&["0".to_string()]).is_empty());
    }
}

//! Compiled module graph, as the bundler emits it.

use crate::paths::probe_suffixes;
use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Module graph file the bundler writes into the client build.
pub const CLIENT_MANIFEST: &str = "manifest.json";

/// One compiled module: its emitted chunk, extracted assets, and direct
/// imports. Read-only input to the manifest builder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompiledModuleRecord {
    /// Emitted chunk file, relative to the client build root.
    pub file: String,
    /// Extracted stylesheets.
    pub css: Vec<String>,
    /// Other emitted assets (images, fonts).
    pub assets: Vec<String>,
    /// Directly imported module keys.
    pub imports: Vec<String>,
    pub is_entry: bool,
}

/// The whole compiled graph, keyed by source module path.
#[derive(Debug, Clone, Default)]
pub struct BundleGraph {
    modules: FxHashMap<String, CompiledModuleRecord>,
}

impl BundleGraph {
    pub fn from_map(modules: FxHashMap<String, CompiledModuleRecord>) -> Self {
        Self { modules }
    }

    /// Load the graph from the bundler's manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read module graph {}", path.display()))?;
        let modules: FxHashMap<String, CompiledModuleRecord> = serde_json::from_str(&content)
            .with_context(|| format!("malformed module graph {}", path.display()))?;
        Ok(Self { modules })
    }

    /// Load the graph and remove the file: the module graph is a build-time
    /// input that must not ship with the deployed client.
    pub fn consume(path: &Path) -> Result<Self> {
        let graph = Self::load(path)?;
        fs::remove_file(path)
            .with_context(|| format!("failed to remove consumed {}", path.display()))?;
        Ok(graph)
    }

    pub fn record(&self, key: &str) -> Option<&CompiledModuleRecord> {
        self.modules.get(key)
    }

    /// Find a record by probing the suffix candidates of `base`.
    pub fn probe(&self, base: &str) -> Option<&CompiledModuleRecord> {
        self.probe_entry(base).map(|(_, record)| record)
    }

    /// Like [`Self::probe`], also returning the module key that matched.
    pub fn probe_entry(&self, base: &str) -> Option<(&str, &CompiledModuleRecord)> {
        probe_suffixes(base, |candidate| {
            self.modules
                .get_key_value(candidate)
                .map(|(key, record)| (key.as_str(), record))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CompiledModuleRecord)> {
        self.modules.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_vite_style_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CLIENT_MANIFEST);
        fs::write(
            &path,
            r#"{
                "src/pages/home.tsx": {
                    "file": "assets/home-aB3x.js",
                    "css": ["assets/home-9fKe.css"],
                    "imports": ["_chunk-shared.js"],
                    "isEntry": false
                },
                "_chunk-shared.js": {
                    "file": "assets/chunk-shared.js"
                }
            }"#,
        )
        .unwrap();

        let graph = BundleGraph::load(&path).unwrap();
        let home = graph.record("src/pages/home.tsx").unwrap();
        assert_eq!(home.file, "assets/home-aB3x.js");
        assert_eq!(home.css, vec!["assets/home-9fKe.css"]);
        assert!(!home.is_entry);
        // missing fields default
        assert!(graph.record("_chunk-shared.js").unwrap().imports.is_empty());
    }

    #[test]
    fn test_probe_uses_suffix_candidates() {
        let mut modules = FxHashMap::default();
        modules.insert(
            "src/pages/home/index.tsx".to_string(),
            CompiledModuleRecord::default(),
        );
        let graph = BundleGraph::from_map(modules);

        assert!(graph.probe("src/pages/home").is_some());
        assert!(graph.probe("src/pages/missing").is_none());
    }

    #[test]
    fn test_consume_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CLIENT_MANIFEST);
        fs::write(&path, "{}").unwrap();

        let graph = BundleGraph::consume(&path).unwrap();
        assert!(graph.is_empty());
        assert!(!path.exists());
    }
}

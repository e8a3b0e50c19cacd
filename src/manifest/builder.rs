//! Batch manifest building from the compiled module graph.
//!
//! Runs strictly after bundling, never concurrently with request serving.

use super::bundle::BundleGraph;
use super::{AssetDescriptor, AssetKind, ENTRY_WEIGHT, sort_assets};
use crate::paths::PathResolver;
use crate::{debug, log};
use anyhow::{Context, Result};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Persisted manifest file name (under the server build directory).
pub const ASSETS_MANIFEST: &str = "assets-manifest.json";

/// `routeId -> ordered asset closure`, the render path's lookup table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteManifest(pub BTreeMap<String, Vec<AssetDescriptor>>);

impl RouteManifest {
    pub fn get(&self, route_id: &str) -> Option<&[AssetDescriptor]> {
        self.0.get(route_id).map(Vec::as_slice)
    }

    /// Merge the closures of several matched routes into one sorted,
    /// url-deduplicated list ready for injection.
    pub fn assets_for(&self, route_ids: &[String]) -> Vec<AssetDescriptor> {
        let mut merged: Vec<AssetDescriptor> = route_ids
            .iter()
            .filter_map(|id| self.0.get(id))
            .flat_map(|assets| assets.iter().cloned())
            .collect();
        sort_assets(&mut merged);

        let mut seen = FxHashSet::default();
        merged.retain(|asset| seen.insert(asset.url.clone()));
        merged
    }

    /// Persist to `<server_dir>/assets-manifest.json`.
    pub fn write(&self, server_dir: &Path) -> Result<()> {
        fs::create_dir_all(server_dir)
            .with_context(|| format!("failed to create {}", server_dir.display()))?;
        let path = server_dir.join(ASSETS_MANIFEST);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Load a manifest persisted by an earlier build.
    pub fn load(server_dir: &Path) -> Result<Self> {
        let path = server_dir.join(ASSETS_MANIFEST);
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("malformed manifest {}", path.display()))
    }
}

/// Computes per-route asset closures.
pub struct ManifestBuilder<'a> {
    graph: &'a BundleGraph,
    paths: &'a PathResolver,
}

impl<'a> ManifestBuilder<'a> {
    pub fn new(graph: &'a BundleGraph, paths: &'a PathResolver) -> Self {
        Self { graph, paths }
    }

    /// Build the manifest for resolved route identities
    /// (`route_id -> import specifier` pairs from the route tree).
    ///
    /// A route whose identity matches no compiled record keeps an empty
    /// entry: the route still renders, just without preload hints.
    pub fn build(&self, identities: &[(String, String)]) -> RouteManifest {
        let mut manifest = BTreeMap::new();

        for (route_id, specifier) in identities {
            let record = self
                .normalize_identity(specifier)
                .and_then(|key| self.graph.probe(&key));

            let assets = match record {
                Some(record) => self.route_assets(record),
                None => {
                    log!("warning"; "route {route_id}: no compiled record for `{specifier}`, rendering without preload assets");
                    Vec::new()
                }
            };
            manifest.insert(route_id.clone(), assets);
        }

        RouteManifest(manifest)
    }

    /// Reduce an import specifier to a module-graph key: resolve aliases and
    /// relative parts against the project root, then strip the root.
    fn normalize_identity(&self, specifier: &str) -> Option<String> {
        let resolved = self.paths.resolve(specifier, None)?;
        let key = self.paths.strip_root(&resolved);
        debug!("manifest"; "identity `{specifier}` -> `{key}`");
        (!key.is_empty()).then_some(key)
    }

    /// Compute one route's closure: direct assets first, then every
    /// transitively imported module's assets flagged nested. First occurrence
    /// of a url wins, so a direct asset is never demoted by a nested one.
    fn route_assets(&self, record: &super::CompiledModuleRecord) -> Vec<AssetDescriptor> {
        let mut assets = Vec::new();
        let mut seen_urls = FxHashSet::default();
        let mut visited = FxHashSet::default();

        self.collect(record, false, &mut seen_urls, &mut visited, &mut assets);
        sort_assets(&mut assets);
        assets
    }

    fn collect(
        &self,
        record: &super::CompiledModuleRecord,
        is_nested: bool,
        seen_urls: &mut FxHashSet<String>,
        visited: &mut FxHashSet<String>,
        out: &mut Vec<AssetDescriptor>,
    ) {
        // Graphs can contain import cycles; each module contributes once.
        if !visited.insert(record.file.clone()) {
            return;
        }

        let own_files = record
            .assets
            .iter()
            .chain(record.css.iter())
            .chain(std::iter::once(&record.file));

        for file in own_files {
            if file.is_empty() || !seen_urls.insert(file.clone()) {
                continue;
            }
            let Some(kind) = AssetKind::from_path(file) else {
                continue;
            };

            let is_entry_file = record.is_entry && *file == record.file;
            out.push(AssetDescriptor {
                kind,
                url: format!("/{file}"),
                weight: if is_entry_file {
                    ENTRY_WEIGHT
                } else {
                    kind.weight()
                },
                is_nested,
                is_preload: !is_entry_file,
                content: None,
            });
        }

        for import in &record.imports {
            if let Some(nested) = self.graph.record(import) {
                self.collect(nested, true, seen_urls, visited, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::CompiledModuleRecord;
    use rustc_hash::FxHashMap;

    fn record(file: &str, css: &[&str], imports: &[&str], is_entry: bool) -> CompiledModuleRecord {
        CompiledModuleRecord {
            file: file.to_string(),
            css: css.iter().map(|s| s.to_string()).collect(),
            assets: Vec::new(),
            imports: imports.iter().map(|s| s.to_string()).collect(),
            is_entry,
        }
    }

    fn graph() -> BundleGraph {
        let mut modules = FxHashMap::default();
        modules.insert(
            "src/pages/home.tsx".to_string(),
            record(
                "assets/home.js",
                &["assets/styles.css"],
                &["src/widgets/chart.ts"],
                true,
            ),
        );
        modules.insert(
            "src/widgets/chart.ts".to_string(),
            record("assets/chart.js", &[], &["src/widgets/util.ts"], false),
        );
        modules.insert(
            "src/widgets/util.ts".to_string(),
            record("assets/util.js", &[], &[], false),
        );
        BundleGraph::from_map(modules)
    }

    fn paths() -> PathResolver {
        PathResolver::new("/app", vec![("@pages".into(), "src/pages".into())])
    }

    #[test]
    fn test_route_closure_ordering_and_nesting() {
        let graph = graph();
        let paths = paths();
        let builder = ManifestBuilder::new(&graph, &paths);

        let manifest = builder.build(&[("0-1".to_string(), "@pages/home".to_string())]);
        let assets = manifest.get("0-1").unwrap();

        let summary: Vec<(&str, f32, bool)> = assets
            .iter()
            .map(|a| (a.url.as_str(), a.weight, a.is_nested))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("/assets/styles.css", 1.0, false),
                ("/assets/home.js", ENTRY_WEIGHT, false),
                ("/assets/chart.js", 2.0, true),
                ("/assets/util.js", 2.0, true),
            ]
        );

        // the route's own entry chunk is loaded directly, not preloaded
        assert!(!assets[1].is_preload);
        assert!(assets[2].is_preload);
    }

    #[test]
    fn test_direct_asset_never_demoted_by_nested_occurrence() {
        let mut modules = FxHashMap::default();
        modules.insert(
            "src/pages/a.tsx".to_string(),
            record(
                "assets/shared.js",
                &[],
                &["src/pages/inner.tsx"],
                false,
            ),
        );
        // inner imports the same emitted chunk
        modules.insert(
            "src/pages/inner.tsx".to_string(),
            record("assets/shared.js", &[], &[], false),
        );
        let graph = BundleGraph::from_map(modules);
        let paths = paths();
        let builder = ManifestBuilder::new(&graph, &paths);

        let manifest = builder.build(&[("0".to_string(), "./src/pages/a".to_string())]);
        let assets = manifest.get("0").unwrap();
        assert_eq!(assets.len(), 1);
        assert!(!assets[0].is_nested);
    }

    #[test]
    fn test_import_cycles_terminate() {
        let mut modules = FxHashMap::default();
        modules.insert(
            "src/a.ts".to_string(),
            record("assets/a.js", &[], &["src/b.ts"], false),
        );
        modules.insert(
            "src/b.ts".to_string(),
            record("assets/b.js", &[], &["src/a.ts"], false),
        );
        let graph = BundleGraph::from_map(modules);
        let paths = paths();
        let builder = ManifestBuilder::new(&graph, &paths);

        let manifest = builder.build(&[("0".to_string(), "./src/a".to_string())]);
        assert_eq!(manifest.get("0").unwrap().len(), 2);
    }

    #[test]
    fn test_unmatched_identity_is_soft() {
        let graph = graph();
        let paths = paths();
        let builder = ManifestBuilder::new(&graph, &paths);

        let manifest = builder.build(&[("0".to_string(), "@pages/missing".to_string())]);
        assert_eq!(manifest.get("0"), Some(&[] as &[AssetDescriptor]));
    }

    #[test]
    fn test_manifest_roundtrip_is_lossless() {
        let graph = graph();
        let paths = paths();
        let builder = ManifestBuilder::new(&graph, &paths);
        let manifest = builder.build(&[("0-1".to_string(), "@pages/home".to_string())]);

        let dir = tempfile::tempdir().unwrap();
        manifest.write(dir.path()).unwrap();
        let reloaded = RouteManifest::load(dir.path()).unwrap();

        assert_eq!(manifest, reloaded);
    }

    #[test]
    fn test_assets_for_merges_and_dedups_across_routes() {
        let graph = graph();
        let paths = paths();
        let builder = ManifestBuilder::new(&graph, &paths);
        let manifest = builder.build(&[
            ("0".to_string(), "@pages/home".to_string()),
            ("0-1".to_string(), "@pages/home".to_string()),
        ]);

        let merged = manifest.assets_for(&["0".to_string(), "0-1".to_string()]);
        let urls: Vec<&str> = merged.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "/assets/styles.css",
                "/assets/home.js",
                "/assets/chart.js",
                "/assets/util.js",
            ]
        );
    }
}

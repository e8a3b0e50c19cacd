//! Live asset resolution for development.
//!
//! In development nothing is bundled: the live module host keeps an
//! in-memory dependency graph that hot-reload mutates concurrently. The walk
//! recomputes a matched route's styles per request, inlining transformed CSS
//! because no emitted files exist yet. A module that disappears mid-walk
//! simply contributes no assets.

use super::{AssetDescriptor, AssetKind, sort_assets};
use crate::paths::probe_suffixes;
use dashmap::DashMap;

/// One module of the live graph, registered by the module host.
#[derive(Debug, Clone, Default)]
pub struct DevModule {
    /// Module ids this module imports.
    pub imports: Vec<String>,
    /// Transformed stylesheet content, for style modules.
    pub css: Option<String>,
}

impl DevModule {
    pub fn with_imports(imports: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            imports: imports.into_iter().map(Into::into).collect(),
            css: None,
        }
    }

    pub fn stylesheet(content: impl Into<String>) -> Self {
        Self {
            imports: Vec::new(),
            css: Some(content.into()),
        }
    }
}

/// Concurrently-mutated module graph maintained by the live module host.
#[derive(Debug, Default)]
pub struct DevModuleGraph {
    modules: DashMap<String, DevModule>,
}

impl DevModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: impl Into<String>, module: DevModule) {
        self.modules.insert(id.into(), module);
    }

    pub fn remove(&self, id: &str) {
        self.modules.remove(id);
    }

    /// Collect style assets reachable from the given root modules (the
    /// client bootstrap plus each matched route module).
    pub fn route_assets(&self, module_ids: &[String]) -> Vec<AssetDescriptor> {
        let mut assets = Vec::new();
        let mut seen = rustc_hash::FxHashSet::default();

        for id in module_ids {
            let resolved =
                probe_suffixes(id, |candidate| {
                    self.modules
                        .contains_key(candidate)
                        .then(|| candidate.to_string())
                });
            if let Some(id) = resolved {
                self.collect(&id, false, &mut seen, &mut assets);
            }
        }

        sort_assets(&mut assets);
        assets
    }

    fn collect(
        &self,
        id: &str,
        is_nested: bool,
        seen: &mut rustc_hash::FxHashSet<String>,
        out: &mut Vec<AssetDescriptor>,
    ) {
        if !seen.insert(id.to_string()) {
            return;
        }

        // Clone out of the shard so hot-reload writes never deadlock the walk.
        let Some(module) = self.modules.get(id).map(|m| m.clone()) else {
            return;
        };

        for import in &module.imports {
            let Some(imported) = self.modules.get(import).map(|m| m.clone()) else {
                continue;
            };

            if let Some(content) = &imported.css {
                if AssetKind::from_path(import) == Some(AssetKind::Style) && seen.insert(import.clone())
                {
                    out.push(AssetDescriptor {
                        kind: AssetKind::Style,
                        url: import.clone(),
                        weight: AssetKind::Style.weight(),
                        is_nested,
                        is_preload: false,
                        content: Some(content.clone()),
                    });
                }
            } else if !imported.imports.is_empty() {
                self.collect(import, true, seen, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> DevModuleGraph {
        let graph = DevModuleGraph::new();
        graph.insert(
            "/app/src/client.tsx",
            DevModule::with_imports(["/app/src/app.css", "/app/src/layout.tsx"]),
        );
        graph.insert("/app/src/app.css", DevModule::stylesheet("body{margin:0}"));
        graph.insert(
            "/app/src/layout.tsx",
            DevModule::with_imports(["/app/src/layout.scss"]),
        );
        graph.insert(
            "/app/src/layout.scss",
            DevModule::stylesheet(".layout{display:grid}"),
        );
        graph
    }

    #[test]
    fn test_walk_inlines_transformed_css() {
        let graph = graph();
        let assets = graph.route_assets(&["/app/src/client.tsx".to_string()]);

        assert_eq!(assets.len(), 2);
        let direct = assets.iter().find(|a| a.url.ends_with("app.css")).unwrap();
        assert!(!direct.is_nested);
        assert_eq!(direct.content.as_deref(), Some("body{margin:0}"));

        let nested = assets.iter().find(|a| a.url.ends_with("layout.scss")).unwrap();
        assert!(nested.is_nested);
    }

    #[test]
    fn test_route_module_resolved_with_suffix_probing() {
        let graph = graph();
        // request-time identity has no extension
        let assets = graph.route_assets(&["/app/src/layout".to_string()]);
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].content.as_deref(), Some(".layout{display:grid}"));
    }

    #[test]
    fn test_missing_module_contributes_nothing() {
        let graph = graph();
        graph.remove("/app/src/layout.scss");

        let assets = graph.route_assets(&[
            "/app/src/client.tsx".to_string(),
            "/app/src/gone.tsx".to_string(),
        ]);
        assert_eq!(assets.len(), 1);
        assert!(assets[0].url.ends_with("app.css"));
    }

    #[test]
    fn test_import_cycles_terminate() {
        let graph = DevModuleGraph::new();
        graph.insert("/a.tsx", DevModule::with_imports(["/b.tsx"]));
        graph.insert("/b.tsx", DevModule::with_imports(["/a.tsx"]));

        let assets = graph.route_assets(&["/a.tsx".to_string()]);
        assert!(assets.is_empty());
    }
}

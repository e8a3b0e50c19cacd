//! `strada build` - the batch pipeline run after bundling.
//!
//! Pipeline phases:
//! - **Resolve** - static route tree analysis from the client entry
//! - **Consume** - load the client module graph, then delete it (it never
//!   ships with the deployed client)
//! - **Manifest** - per-route asset closures, persisted for the render path
//! - **Metadata** - route file -> compiled chunk mapping for the cleanup pass
//! - **Emit** - embedded runtime helper into the client build
//! - **Cleanup** - strip identity arguments from shipped client chunks,
//!   remove the metadata file

use super::BuildArgs;
use crate::config::AppConfig;
use crate::manifest::bundle::CLIENT_MANIFEST;
use crate::manifest::meta::{self, BuildMeta};
use crate::manifest::{BundleGraph, ManifestBuilder};
use crate::routes::{RouteResolver, route_identities};
use crate::transform::strip_identity_args;
use crate::{debug, embed, log};
use anyhow::{Context, Result};
use rustc_hash::FxHashSet;
use std::fs;
use std::time::Instant;

/// Build and persist the per-route assets manifest.
pub fn build_assets(config: &AppConfig, args: &BuildArgs) -> Result<()> {
    let started = Instant::now();

    // Resolve: fatal on any miss, no partial tree.
    let (tree, route_files) = RouteResolver::new(config).resolve_tracked()?;
    let identities = route_identities(&tree);
    log!("build"; "resolved {} routes from {} route files", identities.len(), route_files.len());

    // Consume the module graph so it is not deployed.
    let graph_path = config.client_out_dir().join(CLIENT_MANIFEST);
    let graph = BundleGraph::consume(&graph_path)
        .with_context(|| "is the bundler's client build up to date?")?;

    // Per-route closures.
    let paths = config.path_resolver();
    let manifest = ManifestBuilder::new(&graph, &paths).build(&identities);
    manifest.write(&config.server_out_dir())?;
    log!("build"; "assets manifest written for {} routes", manifest.0.len());

    // Route file -> chunk metadata, for the chunk cleanup below.
    let mut build_meta = BuildMeta::default();
    for file in &route_files {
        let key = paths.strip_root(file);
        if let Some((_, record)) = graph.probe_entry(&key) {
            build_meta.route_files.insert(key, record.file.clone());
        } else {
            debug!("build"; "route file `{key}` has no compiled chunk");
        }
    }
    meta::write_meta(&config.out_dir(), &build_meta)?;

    // Runtime helper next to the client chunks.
    embed::write_embedded_assets(&config.client_out_dir())?;

    // Shipped client code must not carry source paths.
    if !args.keep_identities {
        cleanup_client_routes(config);
    }
    meta::remove_meta(&config.out_dir());

    log!("build"; "finished in {:.2?}", started.elapsed());
    Ok(())
}

/// Strip identity string arguments from every compiled route chunk.
///
/// Best-effort per chunk: a chunk that cannot be read or written is warned
/// about, the rest are still cleaned.
fn cleanup_client_routes(config: &AppConfig) {
    let build_meta = meta::read_meta(&config.out_dir());
    let chunks: FxHashSet<&String> = build_meta.route_files.values().collect();

    for chunk in chunks {
        let path = config.client_out_dir().join(chunk);
        let cleaned = match fs::read_to_string(&path) {
            Ok(code) => strip_identity_args(&code),
            Err(e) => {
                log!("warning"; "failed to clean route chunk {}: {e}", path.display());
                continue;
            }
        };
        if let Err(e) = fs::write(&path, cleaned) {
            log!("warning"; "failed to clean route chunk {}: {e}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::RouteManifest;
    use crate::manifest::builder::ASSETS_MANIFEST;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// A bundled project: entry, one route file, and the graph the bundler
    /// would emit for them.
    fn scaffold(root: &Path) -> AppConfig {
        write(
            root,
            "src/client.tsx",
            r#"
            import App from './app';
            import routes from './routes';
            import { entry } from 'strada/client';

            entry(App, routes);
            "#,
        );
        write(
            root,
            "src/routes/index.ts",
            r#"
            const routes = [
              { path: '/', lazy: () => import('@pages/home') },
            ];
            export default routes;
            "#,
        );
        write(root, "src/pages/home.tsx", "export default 1");
        write(
            root,
            "build/client/manifest.json",
            r#"{
                "src/routes/index.ts": {
                    "file": "assets/routes-x1.js",
                    "isEntry": true
                },
                "src/pages/home.tsx": {
                    "file": "assets/home-y2.js",
                    "css": ["assets/home-y2.css"]
                }
            }"#,
        );
        write(
            root,
            "build/client/assets/routes-x1.js",
            r#"const a=[{path:"/",lazy:()=>n(()=>import("./home-y2.js"),"@pages/home")}];"#,
        );

        let mut config = AppConfig::default();
        config.root = root.to_path_buf();
        config
            .resolve
            .aliases
            .insert("@pages".into(), "src/pages".into());
        config
    }

    fn args() -> BuildArgs {
        BuildArgs {
            out_dir: None,
            keep_identities: false,
        }
    }

    #[test]
    fn test_build_pipeline_end_to_end() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let config = scaffold(root);

        build_assets(&config, &args()).unwrap();

        // manifest persisted with the home route's closure
        let manifest = RouteManifest::load(&config.server_out_dir()).unwrap();
        let assets = manifest.get("0").unwrap();
        let urls: Vec<&str> = assets.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["/assets/home-y2.css", "/assets/home-y2.js"]);

        // module graph consumed, metadata removed, helper emitted
        assert!(!root.join("build/client/manifest.json").exists());
        assert!(!root.join("build/meta.json").exists());
        assert!(root.join("build/client/normalize-route.js").exists());

        // shipped chunk no longer carries the identity argument
        let chunk = fs::read_to_string(root.join("build/client/assets/routes-x1.js")).unwrap();
        assert!(!chunk.contains("@pages/home"));
        assert!(chunk.contains(r#"lazy:()=>n(()=>import("./home-y2.js"))"#));
    }

    #[test]
    fn test_keep_identities_skips_chunk_cleanup() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let config = scaffold(root);

        let args = BuildArgs {
            keep_identities: true,
            ..args()
        };
        build_assets(&config, &args).unwrap();

        let chunk = fs::read_to_string(root.join("build/client/assets/routes-x1.js")).unwrap();
        assert!(chunk.contains("@pages/home"));
        // metadata is still transient
        assert!(!root.join("build/meta.json").exists());
    }

    #[test]
    fn test_missing_module_graph_is_fatal() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let config = scaffold(root);
        fs::remove_file(root.join("build/client/manifest.json")).unwrap();

        assert!(build_assets(&config, &args()).is_err());
    }

    #[test]
    fn test_manifest_written_even_when_a_route_has_no_record() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let config = scaffold(root);
        write(root, "build/client/manifest.json", "{}");

        build_assets(&config, &args()).unwrap();

        let manifest = RouteManifest::load(&config.server_out_dir()).unwrap();
        assert_eq!(manifest.get("0"), Some(&[] as &[crate::manifest::AssetDescriptor]));
        assert!(config.server_out_dir().join(ASSETS_MANIFEST).exists());
    }
}

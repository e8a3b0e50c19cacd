//! Per-route asset closures.
//!
//! A route's asset closure is the deduplicated, weight-sorted set of static
//! files the route transitively depends on: its own emitted chunk, extracted
//! stylesheets, and everything its imports pull in. Closures are computed
//! once per build from the compiled module graph ([`builder`]) and persisted,
//! or recomputed per request from the live module graph in development
//! ([`dev`]).

pub mod builder;
pub mod bundle;
pub mod cache;
pub mod dev;
pub mod meta;

pub use builder::{ManifestBuilder, RouteManifest};
pub use bundle::{BundleGraph, CompiledModuleRecord};
pub use cache::ManifestCache;
pub use dev::{DevModule, DevModuleGraph};

use crate::paths::PathResolver;
use serde::{Deserialize, Serialize};

/// Weight given to a route's own entry chunk so it sorts ahead of sibling
/// scripts but behind stylesheets.
pub const ENTRY_WEIGHT: f32 = 1.9;

/// Where a request's assets come from.
///
/// Production reads the manifest built after bundling; development walks the
/// live module graph on every request.
pub enum AssetSource<'a> {
    Manifest(&'a ManifestCache),
    Dev {
        graph: &'a DevModuleGraph,
        /// The client bootstrap module, always part of the walk roots.
        client_module: String,
        /// Resolves route `pathId` identities to module-graph keys.
        paths: &'a PathResolver,
    },
}

impl AssetSource<'_> {
    /// Assets for a matched route set. `route_ids` are manifest keys;
    /// `module_ids` are the matched routes' import identities (dev only).
    pub fn assets_for_routes(
        &self,
        route_ids: &[String],
        module_ids: &[String],
    ) -> Vec<AssetDescriptor> {
        match self {
            Self::Manifest(cache) => cache.assets_for(route_ids),
            Self::Dev {
                graph,
                client_module,
                paths,
            } => {
                let mut roots = vec![client_module.clone()];
                for id in module_ids {
                    if let Some(resolved) = paths.resolve(id, None) {
                        roots.push(resolved.to_string_lossy().into_owned());
                    }
                }
                graph.route_assets(&roots)
            }
        }
    }
}

/// Kind of static asset, by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Style,
    Script,
    Image,
    Font,
}

impl AssetKind {
    /// Classify an asset path; unknown extensions are excluded entirely.
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = path.rsplit('.').next()?.to_ascii_lowercase();
        match ext.as_str() {
            "css" | "scss" => Some(Self::Style),
            "js" | "mjs" => Some(Self::Script),
            "svg" | "jpg" | "jpeg" | "png" | "webp" | "gif" | "ico" => Some(Self::Image),
            "ttf" | "otf" | "woff" | "woff2" => Some(Self::Font),
            _ => None,
        }
    }

    /// Base sort weight: styles before scripts before everything else.
    pub fn weight(self) -> f32 {
        match self {
            Self::Style => 1.0,
            Self::Script => 2.0,
            Self::Image | Self::Font => 3.0,
        }
    }

    /// `as` attribute value for preload links.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Style => "style",
            Self::Script => "script",
            Self::Image => "image",
            Self::Font => "font",
        }
    }
}

/// One asset of a route's closure. Dedup within and across closures is by
/// url: the first-recorded descriptor for a url wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDescriptor {
    #[serde(rename = "type")]
    pub kind: AssetKind,
    pub url: String,
    pub weight: f32,
    pub is_nested: bool,
    pub is_preload: bool,
    /// Inline stylesheet content (development only, where no file exists).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Sort ascending by `(weight, isNested)`. Stable, so discovery order breaks
/// the remaining ties.
pub fn sort_assets(assets: &mut [AssetDescriptor]) {
    assets.sort_by(|a, b| {
        a.weight
            .total_cmp(&b.weight)
            .then(a.is_nested.cmp(&b.is_nested))
    });
}

/// How injected tags are rendered.
#[derive(Debug, Clone, Copy, Default)]
pub struct InjectOptions {
    /// Emit `<link rel="modulepreload">` for preloadable scripts.
    /// Can reduce lighthouse performance scores when over-used.
    pub module_preload: bool,
}

/// Render an asset list into head tags and splice them before `</head>`.
pub fn inject_assets(header: &str, assets: &[AssetDescriptor], options: InjectOptions) -> String {
    let tags: Vec<String> = assets
        .iter()
        .filter_map(|asset| asset_tag(asset, options))
        .collect();

    if tags.is_empty() {
        return header.to_string();
    }

    let block = tags.join("\n");
    match header.find("</head>") {
        Some(pos) => format!("{}{}</head>{}", &header[..pos], block, &header[pos + 7..]),
        None => format!("{header}{block}"),
    }
}

fn asset_tag(asset: &AssetDescriptor, options: InjectOptions) -> Option<String> {
    match asset.kind {
        AssetKind::Style => Some(match &asset.content {
            // Development: the stylesheet only exists as transformed source.
            Some(content) => format!(
                r#"<style data-strada-dev-id="{}">{}</style>"#,
                asset.url, content
            ),
            None => format!(r#"<link rel="stylesheet" href="{}">"#, asset.url),
        }),
        AssetKind::Script => {
            if asset.is_preload {
                options.module_preload.then(|| {
                    format!(
                        r#"<link rel="modulepreload" as="script" crossorigin href="{}">"#,
                        asset.url
                    )
                })
            } else {
                Some(format!(
                    r#"<script async type="module" crossorigin src="{}"></script>"#,
                    asset.url
                ))
            }
        }
        _ => None,
    }
}

const CRLF: &str = "\r\n";

/// Build the raw `103 Early Hints` block for a provisional response.
///
/// Only style and script assets are hinted; the block goes over the socket
/// before the main status line.
pub fn early_hints_block(assets: &[AssetDescriptor]) -> Vec<u8> {
    let mut block = format!("HTTP/1.1 103 Early Hints{CRLF}");
    for asset in assets {
        if !matches!(asset.kind, AssetKind::Style | AssetKind::Script) {
            continue;
        }
        block.push_str(&format!(
            "Link: <{}>; rel=preload; as={}{CRLF}",
            asset.url,
            asset.kind.as_str()
        ));
    }
    block.push_str(CRLF);
    block.into_bytes()
}

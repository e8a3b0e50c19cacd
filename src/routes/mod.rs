//! Static route tree analysis.
//!
//! The application declares its routes as a (possibly nested, possibly
//! multi-file) array literal handed to the client bootstrap call. The
//! resolver walks that declaration back to file-system import identities at
//! build time, producing a [`RouteNode`] tree whose positions mirror the
//! runtime route ids.

mod ast;
mod resolver;

pub use resolver::RouteResolver;

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// How a route node binds its module, resolved once at tree-build time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RouteKind {
    /// Dynamically imported module: `lazy: () => import("...")`.
    Lazy { specifier: String },
    /// Statically bound component: `Component: Ident` / `element: <Ident/>`,
    /// identity resolved through the file's import map.
    Static { identity: String },
    /// Structural node carrying only children.
    Bare,
}

/// One node of the resolved route tree.
///
/// `index` is the source declaration position in its array, not the position
/// after filtering; child ids derived from it therefore line up with the ids
/// the router assigns at request time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteNode {
    pub index: usize,
    #[serde(flatten)]
    pub kind: RouteKind,
    pub children: Vec<RouteNode>,
}

impl RouteNode {
    /// The node's import identity, if it has one.
    pub fn import_specifier(&self) -> Option<&str> {
        match &self.kind {
            RouteKind::Lazy { specifier } => Some(specifier),
            RouteKind::Static { identity } => Some(identity),
            RouteKind::Bare => None,
        }
    }
}

/// Walk a route tree assigning composite position ids (`"0-2-1"`), returning
/// every identity-carrying node as `(route_id, import_specifier)`.
pub fn route_identities(nodes: &[RouteNode]) -> Vec<(String, String)> {
    let mut out = Vec::new();
    collect_identities(nodes, None, &mut out);
    out
}

fn collect_identities(nodes: &[RouteNode], prefix: Option<&str>, out: &mut Vec<(String, String)>) {
    for node in nodes {
        let id = match prefix {
            Some(prefix) => format!("{prefix}-{}", node.index),
            None => node.index.to_string(),
        };
        if let Some(specifier) = node.import_specifier() {
            out.push((id.clone(), specifier.to_string()));
        }
        collect_identities(&node.children, Some(&id), out);
    }
}

/// Fatal route analysis failure. No partial tree is ever returned.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("failed to read `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse `{0}`")]
    Parse(PathBuf),

    #[error("no `entry(App, routes)` bootstrap call found in `{0}`")]
    BootstrapNotFound(PathBuf),

    #[error("no import binding for routes identifier `{name}` in `{file}`")]
    ImportNotFound { name: String, file: PathBuf },

    #[error("cannot resolve `{0}` to a file")]
    FileNotFound(String),

    #[error("no matching routes export in `{0}`")]
    ExportNotFound(PathBuf),

    #[error("routes binding in `{0}` is not an array literal")]
    NotAnArray(PathBuf),

    #[error("route file cycle through `{0}`")]
    RouteCycle(PathBuf),
}

//! Import specifier resolution: aliases and file probing.
//!
//! Route files reference each other through relative specifiers
//! (`./details`) and alias specifiers (`@pages/home`). Both kinds resolve to
//! a project path first, then candidate files are probed with the
//! `{'', '/index'} x {'', '.js', '.ts', '.tsx'}` suffix cross product.

use std::path::{Component, Path, PathBuf};

/// Candidate suffixes appended to a resolved import path, in probe order.
pub const IMPORT_SUFFIXES: [&str; 8] = [
    "",
    ".js",
    ".ts",
    ".tsx",
    "/index",
    "/index.js",
    "/index.ts",
    "/index.tsx",
];

/// Resolves import specifiers against a project root and an alias table.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    /// Alias table: `find -> replacement`, replacement relative to root.
    aliases: Vec<(String, String)>,
}

impl PathResolver {
    pub fn new(root: impl Into<PathBuf>, aliases: Vec<(String, String)>) -> Self {
        Self {
            root: root.into(),
            aliases,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a specifier to an absolute project path (no file probing).
    ///
    /// Relative specifiers resolve against `relative_to`'s directory when
    /// given, otherwise against the project root. Alias specifiers substitute
    /// the first path segment through the alias table. Bare specifiers
    /// (node_modules packages) resolve to nothing.
    pub fn resolve(&self, specifier: &str, relative_to: Option<&Path>) -> Option<PathBuf> {
        if specifier.is_empty() {
            return None;
        }

        if specifier.starts_with("./") || specifier.starts_with("../") {
            let base = relative_to
                .and_then(Path::parent)
                .unwrap_or(self.root.as_path());
            return Some(normalize_lexically(&base.join(specifier)));
        }

        let head = specifier.split('/').next().unwrap_or(specifier);
        let replacement = self
            .aliases
            .iter()
            .find(|(find, _)| find == head)
            .map(|(_, replacement)| replacement)?;

        let substituted = specifier.replacen(head, replacement, 1);
        let full = if Path::new(&substituted).is_absolute() {
            PathBuf::from(substituted)
        } else {
            self.root.join(substituted)
        };

        Some(normalize_lexically(&full))
    }

    /// Strip the project root from a path and normalize to forward slashes.
    ///
    /// This is the form compiled-module keys use (`src/pages/home`).
    pub fn strip_root(&self, path: &Path) -> String {
        let stripped = path.strip_prefix(&self.root).unwrap_or(path);
        let joined = stripped
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/");
        joined.trim_matches('/').to_string()
    }

    /// Probe the filesystem for the first existing regular file among the
    /// suffix candidates of `base`.
    pub fn find_file(&self, base: &Path) -> Option<PathBuf> {
        probe_suffixes(&base.to_string_lossy(), |candidate| {
            let path = Path::new(candidate);
            path.is_file().then(|| path.to_path_buf())
        })
    }
}

/// Probe the suffix candidates of `base` with `lookup`, returning the first
/// hit. Used against the filesystem at resolve time and against
/// compiled-module key sets at manifest-build time.
pub fn probe_suffixes<T>(base: &str, mut lookup: impl FnMut(&str) -> Option<T>) -> Option<T> {
    for suffix in IMPORT_SUFFIXES {
        if let Some(found) = lookup(&format!("{base}{suffix}")) {
            return Some(found);
        }
    }
    None
}

/// Resolve `.` and `..` components without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> PathResolver {
        PathResolver::new(
            "/app",
            vec![
                ("@pages".into(), "src/pages".into()),
                ("@components".into(), "src/components".into()),
            ],
        )
    }

    #[test]
    fn test_relative_resolves_against_importing_file() {
        let r = resolver();
        let resolved = r.resolve("./details", Some(Path::new("/app/src/routes/index.ts")));
        assert_eq!(resolved, Some(PathBuf::from("/app/src/routes/details")));
    }

    #[test]
    fn test_parent_relative_is_normalized() {
        let r = resolver();
        let resolved = r.resolve("../shared/routes", Some(Path::new("/app/src/routes/index.ts")));
        assert_eq!(resolved, Some(PathBuf::from("/app/src/shared/routes")));
    }

    #[test]
    fn test_alias_substitutes_first_segment() {
        let r = resolver();
        let resolved = r.resolve("@pages/home", None);
        assert_eq!(resolved, Some(PathBuf::from("/app/src/pages/home")));
    }

    #[test]
    fn test_bare_specifier_resolves_to_nothing() {
        let r = resolver();
        assert_eq!(r.resolve("react-router-dom", None), None);
    }

    #[test]
    fn test_strip_root_produces_module_key() {
        let r = resolver();
        assert_eq!(
            r.strip_root(Path::new("/app/src/pages/home")),
            "src/pages/home"
        );
    }

    #[test]
    fn test_suffix_probe_order_prefers_exact_file() {
        let hits = ["src/pages/home.tsx", "src/pages/home/index.tsx"];
        let found = probe_suffixes("src/pages/home", |candidate| {
            hits.contains(&candidate).then(|| candidate.to_string())
        });
        assert_eq!(found.as_deref(), Some("src/pages/home.tsx"));
    }

    #[test]
    fn test_find_file_probes_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src/pages/home")).unwrap();
        std::fs::write(root.join("src/pages/home/index.tsx"), "export default 1").unwrap();

        let r = PathResolver::new(root, vec![("@pages".into(), "src/pages".into())]);
        let base = r.resolve("@pages/home", None).unwrap();
        let found = r.find_file(&base).unwrap();
        assert_eq!(found, root.join("src/pages/home/index.tsx"));
    }
}

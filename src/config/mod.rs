//! Application configuration management for `strada.toml`.
//!
//! # Sections
//!
//! | Section     | Purpose                                            |
//! |-------------|----------------------------------------------------|
//! | `[app]`     | Client entrypoint and HTML shell location          |
//! | `[build]`   | Build output directory, module preload policy      |
//! | `[render]`  | Streaming defaults and abort delay                 |
//! | `[resolve]` | Import alias table used by route analysis          |

mod handle;

pub use handle::{cfg, init_config};

use crate::{cli::Cli, log};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config file parsing error")]
    Toml(#[from] toml::de::Error),

    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Root configuration structure representing strada.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Application entry settings
    pub app: AppSection,

    /// Build settings
    pub build: BuildSection,

    /// Render settings
    pub render: RenderSection,

    /// Import resolution settings
    pub resolve: ResolveSection,
}

/// `[app]` section: where the application lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSection {
    /// Client entrypoint containing the bootstrap call (relative to root).
    pub client: PathBuf,

    /// HTML shell file with the `<!--ssr-outlet-->` marker.
    pub index: PathBuf,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            client: PathBuf::from("src/client.tsx"),
            index: PathBuf::from("index.html"),
        }
    }
}

/// `[build]` section: bundler output layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSection {
    /// Build output directory (relative to root). The bundler writes
    /// `client/` and `server/` beneath it.
    pub out_dir: PathBuf,

    /// Emit `<link rel="modulepreload">` for preloadable scripts.
    /// Disabling can improve first-paint scores on script-heavy routes.
    pub module_preload: bool,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("build"),
            module_preload: true,
        }
    }
}

/// `[render]` section: streaming defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSection {
    /// How long the server waits for the renderer before aborting (ms).
    pub abort_delay_ms: u64,

    /// Stream the body as it renders (false buffers the whole document).
    pub stream: bool,

    /// Send a `103 Early Hints` response listing preloadable assets.
    pub early_hints: bool,
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            abort_delay_ms: 10_000,
            stream: true,
            early_hints: false,
        }
    }
}

/// `[resolve]` section: alias table for import specifiers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveSection {
    /// Alias map, e.g. `"@pages" = "src/pages"`.
    pub aliases: BTreeMap<String, String>,
}

impl AppConfig {
    /// Load configuration from CLI arguments.
    ///
    /// The project root is the config file's parent directory. Unknown keys
    /// are reported as warnings, not errors.
    pub fn load(cli: &Cli) -> Result<Self> {
        let config_path = cli
            .config
            .canonicalize()
            .with_context(|| format!("config file '{}' not found", cli.config.display()))?;

        let mut config = Self::from_path(&config_path)?;
        config.root = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.config_path = config_path;
        config.validate()?;

        Ok(config)
    }

    /// Parse a config file, warning on unknown keys.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_str_with_warnings(&content)
    }

    fn from_str_with_warnings(content: &str) -> Result<Self> {
        let de = toml::de::Deserializer::new(content);
        let mut unknown = Vec::new();
        let config: Self = serde_ignored::deserialize(de, |path| {
            unknown.push(path.to_string());
        })
        .map_err(ConfigError::Toml)?;

        for key in &unknown {
            log!("warning"; "unknown config key `{key}` ignored");
        }

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.render.abort_delay_ms == 0 {
            return Err(ConfigError::Validation(
                "render.abort_delay_ms must be greater than zero".into(),
            )
            .into());
        }
        Ok(())
    }

    pub fn client_file(&self) -> PathBuf {
        self.root.join(&self.app.client)
    }

    pub fn index_file(&self) -> PathBuf {
        self.root.join(&self.app.index)
    }

    pub fn out_dir(&self) -> PathBuf {
        self.root.join(&self.build.out_dir)
    }

    /// Where the bundler wrote the client build (and its module graph).
    pub fn client_out_dir(&self) -> PathBuf {
        self.out_dir().join("client")
    }

    /// Where server-side artifacts (assets manifest) are persisted.
    pub fn server_out_dir(&self) -> PathBuf {
        self.out_dir().join("server")
    }

    pub fn abort_delay(&self) -> Duration {
        Duration::from_millis(self.render.abort_delay_ms)
    }

    /// Alias table as ordered pairs for the path resolver.
    pub fn alias_pairs(&self) -> Vec<(String, String)> {
        self.resolve
            .aliases
            .iter()
            .map(|(find, replacement)| (find.clone(), replacement.clone()))
            .collect()
    }

    pub fn path_resolver(&self) -> crate::paths::PathResolver {
        crate::paths::PathResolver::new(self.root.clone(), self.alias_pairs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.app.client, PathBuf::from("src/client.tsx"));
        assert_eq!(config.build.out_dir, PathBuf::from("build"));
        assert!(config.render.stream);
        assert!(!config.render.early_hints);
        assert_eq!(config.render.abort_delay_ms, 10_000);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [app]
            client = "src/entry.ts"

            [build]
            out_dir = "dist"
            module_preload = false

            [render]
            abort_delay_ms = 5000
            stream = false

            [resolve.aliases]
            "@pages" = "src/pages"
        "#;
        let config = AppConfig::from_str_with_warnings(toml).unwrap();
        assert_eq!(config.app.client, PathBuf::from("src/entry.ts"));
        assert_eq!(config.app.index, PathBuf::from("index.html"));
        assert!(!config.build.module_preload);
        assert_eq!(config.render.abort_delay_ms, 5000);
        assert_eq!(
            config.resolve.aliases.get("@pages").map(String::as_str),
            Some("src/pages")
        );
    }

    #[test]
    fn test_unknown_keys_do_not_fail() {
        let toml = r#"
            [app]
            client = "src/entry.ts"
            typo_key = true
        "#;
        let config = AppConfig::from_str_with_warnings(toml).unwrap();
        assert_eq!(config.app.client, PathBuf::from("src/entry.ts"));
    }

    #[test]
    fn test_zero_abort_delay_rejected() {
        let mut config = AppConfig::default();
        config.render.abort_delay_ms = 0;
        assert!(config.validate().is_err());
    }
}

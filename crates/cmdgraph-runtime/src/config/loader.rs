//! Layered configuration loading.
//!
//! Sources, lowest priority first:
//!
//! 1. built-in defaults
//! 2. `cmdgraph.{profile}.{ext}` beside the main file
//! 3. the main file: `cmdgraph.{ext}` or `config.{ext}`, first match in the
//!    search paths
//! 4. `CMDGRAPH_*` environment variables, `__` separating nested keys
//!    (`CMDGRAPH_SCHEDULER__INTERVAL_SECS=60`)
//!
//! `ext` is `toml` with the `toml-config` feature (default) and `yaml`/`yml`
//! with `yaml-config`. The profile comes from `CMDGRAPH_PROFILE` unless set
//! on the loader, and defaults to `development`.
//!
//! ```rust,ignore
//! let config = ConfigLoader::new()
//!     .file("./deploy/cmdgraph.toml")
//!     .without_env()
//!     .load()?;
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::CmdGraphConfig;
use super::validation::validate_config;

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "CMDGRAPH_";

const PROFILE_VAR: &str = "CMDGRAPH_PROFILE";
const DEFAULT_PROFILE: &str = "development";
const FILE_STEMS: [&str; 2] = ["cmdgraph", "config"];

/// Builds a [`CmdGraphConfig`] from files and the environment.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    profile: String,
    search_paths: Vec<PathBuf>,
    file: Option<PathBuf>,
    env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            profile: std::env::var(PROFILE_VAR)
                .map(|p| p.to_lowercase())
                .unwrap_or_else(|_| DEFAULT_PROFILE.to_string()),
            search_paths: Vec::new(),
            file: None,
            env: true,
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = profile.as_ref().to_lowercase();
        self
    }

    /// Adds a directory to search for the main file.
    ///
    /// Without any search path the current directory and the user config
    /// directory (`~/.config/cmdgraph` on Linux) are searched.
    pub fn search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Loads exactly this file instead of searching; it must exist.
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn without_env(mut self) -> Self {
        self.env = false;
        self
    }

    /// Merges every source, then validates the result.
    pub fn load(self) -> ConfigResult<CmdGraphConfig> {
        let mut figment = Figment::from(Serialized::defaults(CmdGraphConfig::default()));

        for path in self.files()? {
            info!(path = %path.display(), profile = %self.profile, "Loading configuration file");
            figment = merge_file(figment, &path)?;
        }
        if self.env {
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        let config: CmdGraphConfig = figment.extract()?;
        validate_config(&config)?;

        debug!(
            session = %config.bot.session,
            storage = %config.storage.path.display(),
            scheduler = config.scheduler.enabled,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Files to merge, lowest priority first.
    fn files(&self) -> ConfigResult<Vec<PathBuf>> {
        if let Some(path) = &self.file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            return Ok(self.with_profile_variant(path));
        }

        let dirs = self.search_dirs();
        let found = dirs.iter().find_map(|dir| {
            FILE_STEMS.iter().find_map(|stem| {
                extensions()
                    .into_iter()
                    .map(|ext| dir.join(format!("{stem}.{ext}")))
                    .find(|path| path.exists())
            })
        });

        match found {
            Some(path) => Ok(self.with_profile_variant(&path)),
            None => {
                warn!(paths = ?dirs, "No configuration file found, using defaults");
                Ok(Vec::new())
            }
        }
    }

    /// `dir/stem.{profile}.ext` (when present) followed by `path` itself.
    fn with_profile_variant(&self, path: &Path) -> Vec<PathBuf> {
        let stem = path.file_stem().and_then(OsStr::to_str).unwrap_or_default();
        let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
        let variant = path.with_file_name(format!("{stem}.{}.{ext}", self.profile));

        let mut files = Vec::with_capacity(2);
        if variant.exists() {
            files.push(variant);
        }
        files.push(path.to_path_buf());
        files
    }

    fn search_dirs(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join("cmdgraph")))
            .collect()
    }
}

/// Extensions of the compiled-in file formats, in search order.
fn extensions() -> Vec<&'static str> {
    #[allow(unused_mut)]
    let mut exts = Vec::new();
    #[cfg(feature = "toml-config")]
    exts.push("toml");
    #[cfg(feature = "yaml-config")]
    exts.extend(["yaml", "yml"]);
    exts
}

fn merge_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    match path.extension().and_then(OsStr::to_str) {
        #[cfg(feature = "toml-config")]
        Some("toml") => Ok(figment.merge(Toml::file(path))),
        #[cfg(feature = "yaml-config")]
        Some("yaml" | "yml") => Ok(figment.merge(Yaml::file(path))),
        other => Err(ConfigError::ParseError(format!(
            "unsupported configuration file format: {}",
            other.unwrap_or("(none)")
        ))),
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<CmdGraphConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from one file plus the environment.
pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<CmdGraphConfig> {
    ConfigLoader::new().file(path.as_ref()).load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;
    use figment::Jail;

    #[test]
    fn test_default_config() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap();
            assert_eq!(config, CmdGraphConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "cmdgraph.toml",
                r#"
                [bot]
                session = "from_file"

                [scheduler]
                interval_secs = 30
                "#,
            )?;
            jail.set_env("CMDGRAPH_SCHEDULER__INTERVAL_SECS", "90");
            jail.set_env("CMDGRAPH_LOGGING__LEVEL", "debug");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .load()
                .unwrap();
            assert_eq!(config.bot.session, "from_file");
            assert_eq!(config.scheduler.interval_secs, 90);
            assert_eq!(config.logging.level, LogLevel::Debug);
            Ok(())
        });
    }

    #[test]
    fn test_profile_file_is_overridden_by_base() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "cmdgraph.production.toml",
                "[bot]\nsession = \"prod\"\n[storage]\npath = \"/srv/db.json\"",
            )?;
            jail.create_file("cmdgraph.toml", "[bot]\nsession = \"base\"")?;

            let config = ConfigLoader::new()
                .profile("Production")
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap();
            assert_eq!(config.bot.session, "base");
            assert_eq!(config.storage.path, PathBuf::from("/srv/db.json"));
            Ok(())
        });
    }

    #[test]
    fn test_profile_from_env() {
        Jail::expect_with(|jail| {
            jail.create_file("config.staging.toml", "[scheduler]\nenabled = false")?;
            jail.create_file("config.toml", "")?;
            jail.set_env("CMDGRAPH_PROFILE", "staging");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .load()
                .unwrap();
            assert!(!config.scheduler.enabled);
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        let result = ConfigLoader::new().file("/nonexistent/cmdgraph.toml").load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        Jail::expect_with(|jail| {
            jail.create_file("cmdgraph.toml", "[scheduler]\ninterval_secs = 0")?;
            let result = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load();
            assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
            Ok(())
        });
    }
}

//! Settings for the `sealstream` command line tool.
//!
//! Values come from a JSON file and can be overridden from the environment.
//! Priority: environment > file > defaults.
//!
//! ## Environment Variables
//!
//! - `SEALSTREAM_CONFIG`: config file path
//! - `SEALSTREAM_OVERWRITE`: `true`/`false`, replace existing outputs
//! - `SEALSTREAM_LOG`: log filter, e.g. `info` or `sealstream=debug`

use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ENV_CONFIG_PATH: &str = "SEALSTREAM_CONFIG";
pub const ENV_OVERWRITE: &str = "SEALSTREAM_OVERWRITE";
pub const ENV_LOG: &str = "SEALSTREAM_LOG";

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Replace existing output files without `--force`.
    pub overwrite: bool,
    /// `tracing` filter used when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            overwrite: false,
            log_filter: "warn".to_string(),
        }
    }
}

impl Config {
    /// Loads the config file at `path`, which must exist.
    pub fn load(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&s)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Resolves and loads the effective configuration.
    ///
    /// An explicit `path` must exist. Without one, the platform config file
    /// is used if present, else the defaults. Environment overrides are
    /// applied last.
    pub fn load_with_env(path: Option<&Path>) -> Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| env::var_os(ENV_CONFIG_PATH).map(PathBuf::from));

        let mut config = match explicit {
            Some(p) => Self::load(&p)?,
            None => match default_path() {
                Some(p) if p.exists() => Self::load(&p)?,
                _ => {
                    debug!("using default configuration");
                    Config::default()
                }
            },
        };

        config.apply_overrides(|name| env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides looked up by variable name.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = lookup(ENV_OVERWRITE) {
            self.overwrite = parse_bool(&value)
                .with_context(|| format!("invalid value for {ENV_OVERWRITE}"))?;
            debug!(overwrite = self.overwrite, "overriding overwrite from environment");
        }

        if let Some(filter) = lookup(ENV_LOG) {
            debug!(log_filter = %filter, "overriding log_filter from environment");
            self.log_filter = filter;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.log_filter.trim().is_empty() {
            bail!("log_filter cannot be empty");
        }
        Ok(())
    }
}

/// `<platform config dir>/sealstream/config.json`, if the platform has one.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "sealstream").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got {other:?}"),
    }
}

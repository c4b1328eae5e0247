//! Cache configuration management.
//!
//! Settings are layered with `figment`: built-in defaults first, then an
//! optional TOML file. The default file lives in the platform configuration
//! directory (`~/.config/halocache/config.toml` on Linux).
//!
//! ```toml
//! cache_log_fname = "/data/halos/cache_log.txt"
//! read_log_on_open = true
//! redshift_tolerance = 0.05
//! ```

use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::providers::{Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default redshift tolerance for [`EntryFilter`](crate::cache::EntryFilter) queries.
pub const DEFAULT_REDSHIFT_TOLERANCE: f64 = 0.05;

/// Cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Location of the ascii cache log. `None` means the standard location.
    pub cache_log_fname: Option<PathBuf>,
    /// Whether opening a cache reads the existing log.
    pub read_log_on_open: bool,
    /// Redshift tolerance used when matching entries by redshift.
    pub redshift_tolerance: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_log_fname: None,
            read_log_on_open: true,
            redshift_tolerance: DEFAULT_REDSHIFT_TOLERANCE,
        }
    }
}

impl CacheConfig {
    /// Load the configuration from the default platform-specific path.
    ///
    /// Falls back to defaults when the file is missing or unreadable.
    pub fn load() -> Self {
        let loaded = Self::config_path().and_then(|path| Self::load_from(&path));
        match loaded {
            Ok(config) => config,
            Err(e) => {
                log::debug!("Failed to load config, using defaults: {:#}", e);
                Self::default()
            }
        }
    }

    /// Load the configuration layered over defaults from a TOML file.
    ///
    /// A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if path.exists() {
            log::debug!("Loading config from {}", path.display());
            figment = figment.merge(Toml::file(path));
        }
        let config: Self = figment
            .extract()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration as TOML to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    /// Save the configuration to the default platform-specific path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    fn validate(&self) -> Result<()> {
        if !(self.redshift_tolerance.is_finite() && self.redshift_tolerance >= 0.0) {
            anyhow::bail!(
                "redshift_tolerance must be a non-negative number, got {}",
                self.redshift_tolerance
            );
        }
        Ok(())
    }

    /// Get the default platform-specific configuration path.
    pub fn config_path() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("org", "halocache", "halocache")
            .ok_or_else(|| anyhow::anyhow!("Failed to determine project directories"))?;
        Ok(project_dirs.config_dir().join("config.toml"))
    }
}

//! Configuration management for qsub
//!
//! Configuration is read from TOML files in increasing priority:
//!
//! 1. System: `/etc/qsub/config.toml`
//! 2. User: `~/.config/qsub/config.toml` (platform config dir)
//! 3. Local: `./qsub.toml`
//!
//! Later files override individual keys of earlier ones; tables are merged,
//! not replaced. Anything not set anywhere keeps its default.

pub mod qsub;
pub mod server;

pub use qsub::QsubConfig;
pub use server::{ServerConfig, ServerLoggingConfig};

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Locations searched for configuration files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    pub system: PathBuf,
    pub user: Option<PathBuf>,
    pub local: PathBuf,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigPaths {
    pub fn new() -> Self {
        Self {
            system: PathBuf::from("/etc/qsub/config.toml"),
            user: dirs::config_dir().map(|d| d.join("qsub").join("config.toml")),
            local: PathBuf::from("qsub.toml"),
        }
    }

    /// Paths in priority order (lowest first) that exist on disk
    pub fn existing_paths(&self) -> Vec<&PathBuf> {
        let mut paths = vec![&self.system];
        if let Some(user) = &self.user {
            paths.push(user);
        }
        paths.push(&self.local);
        paths.into_iter().filter(|p| p.exists()).collect()
    }

    /// Directory holding the user config file
    pub fn user_config_dir(&self) -> Option<&Path> {
        self.user.as_deref().and_then(Path::parent)
    }
}

/// Complete qsub configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QsubAppConfig {
    pub server: ServerConfig,
    pub qsub: QsubConfig,
}

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

impl QsubAppConfig {
    /// Load from the standard locations
    pub fn load() -> Result<Self> {
        Self::load_with_paths(&ConfigPaths::new())
    }

    pub fn load_with_paths(paths: &ConfigPaths) -> Result<Self> {
        let files: Vec<PathBuf> = paths.existing_paths().into_iter().cloned().collect();
        Self::load_from_files(&files)
    }

    /// Merge the given files in order; missing files are skipped
    pub fn load_from_files(files: &[PathBuf]) -> Result<Self> {
        let mut merged = toml::Value::Table(toml::map::Map::new());
        for path in files {
            if !path.exists() {
                debug!("Config file {} does not exist, skipping", path.display());
                continue;
            }
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let value: toml::Value = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            debug!("Loaded config file {}", path.display());
            merge_values(&mut merged, value);
        }

        merged
            .try_into()
            .context("Failed to deserialize merged configuration")
    }

    /// Check value ranges; returns every problem found
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !is_log_filter(&self.server.log_level) {
            errors.push(format!(
                "server.log_level must be one of {:?} or a filter like 'qsub=debug,info', got '{}'",
                LOG_LEVELS, self.server.log_level
            ));
        }
        if self.server.port == 0 {
            errors.push("server.port must be greater than 0".to_string());
        }
        if self.server.threads == 0 {
            errors.push("server.threads must be greater than 0".to_string());
        }
        if self.qsub.job_name.trim().is_empty() {
            errors.push("qsub.job_name must not be empty".to_string());
        } else if self.qsub.job_name.chars().any(char::is_whitespace) {
            errors.push(format!(
                "qsub.job_name must not contain whitespace, got '{}'",
                self.qsub.job_name
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Commented default configuration, suitable for `qsub.toml`
    pub fn generate_default_config() -> String {
        let body = Self::default()
            .to_toml()
            .unwrap_or_else(|_| "[server]\n\n[qsub]\n".to_string());
        format!(
            "# qsub configuration\n\
             #\n\
             # Read from /etc/qsub/config.toml, the user config directory and ./qsub.toml.\n\
             # Later files override earlier ones.\n\n{}",
            body
        )
    }
}

/// A bare level or comma-separated `target=level` directives, as `RUST_LOG` takes them
fn is_log_filter(filter: &str) -> bool {
    let is_level = |level: &str| {
        let level = level.trim().to_lowercase();
        level == "off" || LOG_LEVELS.contains(&level.as_str())
    };
    let mut directives = filter.split(',').map(str::trim).filter(|d| !d.is_empty()).peekable();
    if directives.peek().is_none() {
        return false;
    }
    directives.all(|directive| match directive.rsplit_once('=') {
        Some((target, level)) => !target.trim().is_empty() && is_level(level),
        None => is_level(directive),
    })
}

/// Deep merge of `overlay` into `base`; tables merge key by key
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

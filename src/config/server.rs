//! Server configuration for qsub-server

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the qsub-server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,

    /// Hostname or IP address to bind to
    #[serde(alias = "url")]
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Number of worker threads
    pub threads: u32,

    /// Path to the JSON cluster snapshot written by the collector
    pub snapshot_path: Option<PathBuf>,

    /// Interval in seconds between snapshot reloads (0 disables reloading)
    pub refresh_interval_secs: u64,

    /// Logging configuration
    pub logging: ServerLoggingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            threads: 1,
            snapshot_path: None,
            refresh_interval_secs: 300,
            logging: ServerLoggingConfig::default(),
        }
    }
}

/// Logging configuration for the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct ServerLoggingConfig {
    /// Directory for log files (enables daily rotated file logging)
    pub log_dir: Option<PathBuf>,

    /// Use JSON format for log files
    pub json_logs: bool,
}

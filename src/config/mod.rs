use anyhow::Result;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use defaults::*;
use duration_serde::duration;

/// Top-level bridge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub icon_cache: IconCacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Per-session timing and clustering behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// How long map creation waits for the native one-shot ready signal
    #[serde(default = "default_ready_timeout", with = "duration")]
    pub ready_timeout: Duration,

    /// How long a snapshot waits for the native capture callback
    #[serde(default = "default_snapshot_timeout", with = "duration")]
    pub snapshot_timeout: Duration,

    /// Quiet period after the last camera move before re-clustering
    #[serde(default = "default_recluster_debounce", with = "duration")]
    pub recluster_debounce: Duration,

    /// Grouping radius for clustering, in density-independent pixels
    #[serde(default = "default_cluster_max_distance_px")]
    pub cluster_max_distance_px: f64,

    /// Minimum member count rendered as a cluster when the host does not pass one
    #[serde(default = "default_min_cluster_size")]
    pub default_min_cluster_size: usize,
}

/// Sharing scope of the icon cache
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IconCacheScope {
    /// One cache for every session in the process; survives session destruction
    #[default]
    Shared,
    /// One cache per session; purged when the session is destroyed
    PerSession,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IconCacheConfig {
    /// Upper bound on resident decoded icon bytes
    #[serde(default = "default_icon_cache_capacity")]
    pub capacity_bytes: usize,
    #[serde(default)]
    pub scope: IconCacheScope,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON formatted log lines
    #[serde(default)]
    pub json: bool,
}

fn default_ready_timeout() -> Duration {
    Duration::from_secs(DEFAULT_READY_TIMEOUT_SECS)
}

fn default_snapshot_timeout() -> Duration {
    Duration::from_secs(DEFAULT_SNAPSHOT_TIMEOUT_SECS)
}

fn default_recluster_debounce() -> Duration {
    Duration::from_millis(DEFAULT_RECLUSTER_DEBOUNCE_MS)
}

fn default_cluster_max_distance_px() -> f64 {
    DEFAULT_CLUSTER_MAX_DISTANCE_PX
}

fn default_min_cluster_size() -> usize {
    DEFAULT_MIN_CLUSTER_SIZE
}

fn default_icon_cache_capacity() -> usize {
    DEFAULT_ICON_CACHE_CAPACITY_BYTES
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ready_timeout: default_ready_timeout(),
            snapshot_timeout: default_snapshot_timeout(),
            recluster_debounce: default_recluster_debounce(),
            cluster_max_distance_px: default_cluster_max_distance_px(),
            default_min_cluster_size: default_min_cluster_size(),
        }
    }
}

impl Default for IconCacheConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: default_icon_cache_capacity(),
            scope: IconCacheScope::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "map-bridge.toml".to_string());
        Self::load_from_file(&config_file)
    }

    /// Layer defaults, the TOML file (if present) and `MAP_BRIDGE_*` env overrides
    pub fn load_from_file(config_file: &str) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if Path::new(config_file).exists() {
            figment = figment.merge(Toml::file(config_file));
            info!("Loading configuration from {}", config_file);
        } else {
            info!("Config file {} not found, using defaults", config_file);
        }

        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split(ENV_NESTING_SEPARATOR))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.icon_cache.capacity_bytes == 0 {
            anyhow::bail!("icon_cache.capacity_bytes must be greater than zero");
        }
        if self.session.default_min_cluster_size == 0 {
            anyhow::bail!("session.default_min_cluster_size must be at least 1");
        }
        if !(self.session.cluster_max_distance_px > 0.0) {
            anyhow::bail!("session.cluster_max_distance_px must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.session.recluster_debounce, Duration::from_millis(100));
        assert_eq!(config.session.ready_timeout, Duration::from_secs(10));
        assert_eq!(config.icon_cache.scope, IconCacheScope::Shared);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = Config::load_from_file("/nonexistent/map-bridge.toml").unwrap();
        assert_eq!(config.icon_cache, IconCacheConfig::default());
    }

    #[test]
    fn test_load_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[session]
ready_timeout = "2s"
recluster_debounce = "250ms"

[icon_cache]
capacity_bytes = 4096
scope = "per_session"
"#
        )
        .unwrap();

        let config = Config::load_from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.session.ready_timeout, Duration::from_secs(2));
        assert_eq!(config.session.recluster_debounce, Duration::from_millis(250));
        assert_eq!(config.session.snapshot_timeout, Duration::from_secs(5));
        assert_eq!(config.icon_cache.capacity_bytes, 4096);
        assert_eq!(config.icon_cache.scope, IconCacheScope::PerSession);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let mut config = Config::default();
        config.icon_cache.capacity_bytes = 0;
        assert!(config.validate().is_err());
    }
}

/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Session defaults
pub const DEFAULT_READY_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SNAPSHOT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_RECLUSTER_DEBOUNCE_MS: u64 = 100;
pub const DEFAULT_CLUSTER_MAX_DISTANCE_PX: f64 = 100.0;
pub const DEFAULT_MIN_CLUSTER_SIZE: usize = 4;

// Icon cache defaults
pub const DEFAULT_ICON_CACHE_CAPACITY_BYTES: usize = 32 * 1024 * 1024; // 32MB

// Marker icon limits
pub const MAX_ICON_EDGE_PX: f64 = 1024.0; // CSS pixels per edge
pub const MAX_ICON_PIXELS: u64 = 4096 * 4096; // device pixels after dpr scaling

// Logging defaults
pub const DEFAULT_LOG_LEVEL: &str = "info";

// Environment overrides, e.g. MAP_BRIDGE_SESSION__READY_TIMEOUT=30s
pub const ENV_PREFIX: &str = "MAP_BRIDGE_";
pub const ENV_NESTING_SEPARATOR: &str = "__";

//! Config data model (spec §6).

use serde::Deserialize;

fn default_update_interval() -> u64 {
    300
}
fn default_active_threshold_kb() -> u64 {
    10
}
fn default_max_api_calls() -> u32 {
    500
}
fn default_differential_threshold() -> f64 {
    0.2
}
fn default_rollout_percentage() -> u8 {
    100
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8089
}
fn default_max_managed_torrents() -> usize {
    1000
}
fn default_cache_ttl_seconds() -> u64 {
    1800
}
fn default_borrow_threshold_ratio() -> f64 {
    0.9
}
fn default_max_borrow_fraction() -> f64 {
    0.5
}
fn default_smoothing_alpha() -> f64 {
    0.4
}
fn default_min_effective_delta() -> f64 {
    0.1
}

/// Bandwidth allocation strategy selector (spec §4.5).
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AllocationStrategy {
    #[default]
    Equal,
    Weighted,
    Soft,
}

/// `global.*` knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct GlobalConfig {
    #[serde(default = "default_update_interval")]
    pub update_interval: u64,
    #[serde(default = "default_active_threshold_kb")]
    pub active_torrent_threshold_kb: u64,
    #[serde(default = "default_max_api_calls")]
    pub max_api_calls_per_cycle: u32,
    #[serde(default = "default_differential_threshold")]
    pub differential_threshold: f64,
    #[serde(default = "default_rollout_percentage")]
    pub rollout_percentage: u8,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub allocation_strategy: AllocationStrategy,
    #[serde(default = "default_max_managed_torrents")]
    pub max_managed_torrents: usize,
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub dry_run_store_path: Option<String>,
    #[serde(default)]
    pub auto_unlimit_on_inactive: bool,
    #[serde(default = "default_borrow_threshold_ratio")]
    pub borrow_threshold_ratio: f64,
    #[serde(default = "default_max_borrow_fraction")]
    pub max_borrow_fraction: f64,
    #[serde(default = "default_smoothing_alpha")]
    pub smoothing_alpha: f64,
    #[serde(default = "default_min_effective_delta")]
    pub min_effective_delta: f64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            update_interval: default_update_interval(),
            active_torrent_threshold_kb: default_active_threshold_kb(),
            max_api_calls_per_cycle: default_max_api_calls(),
            differential_threshold: default_differential_threshold(),
            rollout_percentage: default_rollout_percentage(),
            host: default_host(),
            port: default_port(),
            allocation_strategy: AllocationStrategy::default(),
            max_managed_torrents: default_max_managed_torrents(),
            cache_ttl_seconds: default_cache_ttl_seconds(),
            dry_run: false,
            dry_run_store_path: None,
            auto_unlimit_on_inactive: false,
            borrow_threshold_ratio: default_borrow_threshold_ratio(),
            max_borrow_fraction: default_max_borrow_fraction(),
            smoothing_alpha: default_smoothing_alpha(),
            min_effective_delta: default_min_effective_delta(),
        }
    }
}

/// `qbittorrent.*` connection details.
#[derive(Debug, Clone, Deserialize)]
pub struct QbitConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl QbitConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// One entry of `trackers[]`.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfigEntry {
    pub id: String,
    pub name: String,
    pub pattern: String,
    pub max_upload_speed: i64,
    #[serde(default)]
    pub priority: i64,
}

fn default_cross_seed_enabled() -> bool {
    false
}

/// `cross_seed.*` collaborator settings.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CrossSeedConfig {
    #[serde(default = "default_cross_seed_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_database_path() -> String {
    "rollback.sqlite".to_string()
}

/// `rollback.*` settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RollbackConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default)]
    pub track_all_changes: bool,
}

impl Default for RollbackConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            track_all_changes: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `logging.*` settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_global() -> GlobalConfig {
    GlobalConfig::default()
}
fn default_cross_seed() -> CrossSeedConfig {
    CrossSeedConfig::default()
}
fn default_rollback() -> RollbackConfig {
    RollbackConfig::default()
}
fn default_logging() -> LoggingConfig {
    LoggingConfig::default()
}

/// Root of the YAML configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_global")]
    pub global: GlobalConfig,
    pub qbittorrent: QbitConfig,
    pub trackers: Vec<TrackerConfigEntry>,
    #[serde(default = "default_cross_seed")]
    pub cross_seed: CrossSeedConfig,
    #[serde(default = "default_rollback")]
    pub rollback: RollbackConfig,
    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,
}

//! # Sync Configuration
//!
//! Configuration management for the sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     Configuration Priority                          │
//! │                                                                     │
//! │  1. Environment variables (highest)                                 │
//! │     NADI_SYNC_MODE=offline                                          │
//! │     NADI_DEVICE_ID=abc-123                                          │
//! │     NADI_TENANT_ID=...                                              │
//! │                                                                     │
//! │  2. TOML config file                                                │
//! │     ~/.config/nadi-pos/sync.toml (Linux)                            │
//! │     ~/Library/Application Support/com.nadi.pos/sync.toml (macOS)    │
//! │                                                                     │
//! │  3. Default values (lowest)                                         │
//! │     SyncMode::Auto, generated device id, default tenant             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [device]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Kasir 1"
//!
//! [tenant]
//! id = "00000000-0000-0000-0000-000000000001"
//!
//! [sync]
//! mode = "auto"          # auto | manual | offline
//! batch_size = 100
//! poll_interval_secs = 30
//! max_retries = 10
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Sync Mode
// =============================================================================

/// How the engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Background runner drives push/pull cycles on the poll interval.
    #[default]
    Auto,

    /// Cycles run only when explicitly requested (e.g. a "Sync now"
    /// button).
    Manual,

    /// Sync disabled completely; local operations only.
    Offline,
}

impl SyncMode {
    /// True if sync is enabled at all.
    pub fn is_sync_enabled(&self) -> bool {
        !matches!(self, SyncMode::Offline)
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMode::Auto => write!(f, "auto"),
            SyncMode::Manual => write!(f, "manual"),
            SyncMode::Offline => write!(f, "offline"),
        }
    }
}

impl std::str::FromStr for SyncMode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(SyncMode::Auto),
            "manual" => Ok(SyncMode::Manual),
            "offline" | "disabled" => Ok(SyncMode::Offline),
            other => Err(SyncError::InvalidConfig(format!(
                "Unknown sync mode: '{}'. Valid options: auto, manual, offline",
                other
            ))),
        }
    }
}

// =============================================================================
// Device / Tenant Configuration
// =============================================================================

/// Identity of this device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device identifier, generated on first run if absent.
    pub id: String,

    /// Human-readable device name ("Kasir 1", "Gudang").
    #[serde(default = "default_device_name")]
    pub name: String,
}

fn default_device_name() -> String {
    "POS Terminal".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            id: Uuid::new_v4().to_string(),
            name: default_device_name(),
        }
    }
}

/// The tenant (shop account) every remote row is scoped by.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    pub id: String,
}

impl Default for TenantConfig {
    fn default() -> Self {
        TenantConfig {
            id: nadi_core::DEFAULT_TENANT_ID.to_string(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Sync behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Engine mode.
    #[serde(default)]
    pub mode: SyncMode,

    /// Rows per push/pull batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Interval between cycles in Auto mode (seconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Per-row push attempt budget before a row is marked `failed`.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff after a transient network error (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Backoff ceiling (seconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

fn default_batch_size() -> usize {
    100
}
fn default_poll_interval() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    10
}
fn default_initial_backoff() -> u64 {
    500
}
fn default_max_backoff() -> u64 {
    60
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            mode: SyncMode::default(),
            batch_size: default_batch_size(),
            poll_interval_secs: default_poll_interval(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Device identity.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Tenant scope.
    #[serde(default)]
    pub tenant: TenantConfig,

    /// Sync behavior.
    #[serde(default)]
    pub sync: SyncSettings,
}

impl SyncConfig {
    /// Creates a config with defaults and a generated device id.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or falls back to defaults on failure.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.device.id.is_empty() {
            return Err(SyncError::MissingDeviceId);
        }

        if self.tenant.id.is_empty() {
            return Err(SyncError::InvalidConfig("tenant id must not be empty".into()));
        }

        if self.sync.batch_size == 0 {
            return Err(SyncError::InvalidConfig(
                "batch_size must be greater than 0".into(),
            ));
        }

        if self.sync.max_retries == 0 {
            return Err(SyncError::InvalidConfig(
                "max_retries must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("NADI_DEVICE_ID") {
            debug!(device_id = %id, "Overriding device ID from environment");
            self.device.id = id;
        }

        if let Ok(name) = std::env::var("NADI_DEVICE_NAME") {
            self.device.name = name;
        }

        if let Ok(id) = std::env::var("NADI_TENANT_ID") {
            debug!(tenant_id = %id, "Overriding tenant ID from environment");
            self.tenant.id = id;
        }

        if let Ok(mode) = std::env::var("NADI_SYNC_MODE") {
            if let Ok(parsed) = mode.parse() {
                debug!(mode = %mode, "Overriding sync mode from environment");
                self.sync.mode = parsed;
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "nadi", "pos")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the device id.
    pub fn device_id(&self) -> &str {
        &self.device.id
    }

    /// Returns the tenant id.
    pub fn tenant_id(&self) -> &str {
        &self.tenant.id
    }

    /// Returns the sync mode.
    pub fn mode(&self) -> SyncMode {
        self.sync.mode
    }

    /// True if sync is enabled.
    pub fn is_sync_enabled(&self) -> bool {
        self.sync.mode.is_sync_enabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_mode_parsing() {
        assert_eq!("auto".parse::<SyncMode>().unwrap(), SyncMode::Auto);
        assert_eq!("manual".parse::<SyncMode>().unwrap(), SyncMode::Manual);
        assert_eq!("offline".parse::<SyncMode>().unwrap(), SyncMode::Offline);
        assert_eq!("disabled".parse::<SyncMode>().unwrap(), SyncMode::Offline);
        assert!("invalid".parse::<SyncMode>().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert!(!config.device.id.is_empty()); // generated
        assert_eq!(config.tenant.id, nadi_core::DEFAULT_TENANT_ID);
        assert_eq!(config.sync.mode, SyncMode::Auto);
        assert_eq!(config.sync.batch_size, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SyncConfig::default();

        config.device.id = String::new();
        assert!(config.validate().is_err());

        config.device.id = "device-1".to_string();
        config.sync.batch_size = 0;
        assert!(config.validate().is_err());

        config.sync.batch_size = 50;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = SyncConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[device]"));
        assert!(toml_str.contains("[tenant]"));
        assert!(toml_str.contains("[sync]"));

        let parsed: SyncConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.device.id, config.device.id);
    }
}

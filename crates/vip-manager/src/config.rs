//! Settings loading and validation for the vip-manager binary.

use common::logging;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Settings error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("invalid settings: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

/// Main settings structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub discovery: DiscoverySettings,

    #[serde(default)]
    pub controller: ControllerSettings,

    #[serde(default)]
    pub keepalived: KeepalivedSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Validate for Settings {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        self.discovery.validate()?;
        self.controller.validate()?;
        self.keepalived.validate()?;
        Ok(())
    }
}

/// Discovery backend settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DiscoverySettings {
    /// Base URL of the membership/metadata source.
    #[validate(custom = "validate_endpoint")]
    pub endpoint: String,

    /// Service whose annotations and membership drive the VIP.
    #[validate(length(min = 1))]
    pub service: String,

    /// This replica's instance name in the discovery source.
    #[validate(length(min = 1))]
    pub instance: String,
}

/// Reconciliation loop settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ControllerSettings {
    /// Fixed period between reconciliation ticks.
    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_reconcile_interval")]
    pub reconcile_interval: Duration,
}

/// keepalived process settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct KeepalivedSettings {
    /// Path to the keepalived binary.
    #[validate(length(min = 1))]
    pub binary: String,

    /// Path keepalived reads its configuration from.
    #[validate(custom = "validate_config_path")]
    pub config_path: PathBuf,

    /// Path to the `ip` binary used for VIP cleanup.
    #[validate(length(min = 1))]
    pub ip_binary: String,

    /// How long to wait for keepalived to exit after SIGTERM before
    /// killing it.
    #[serde(with = "humantime_serde")]
    pub stop_timeout: Duration,
}

/// Logging settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: Option<String>,
    pub format: Option<String>,
}

impl LoggingSettings {
    /// Effective default log level.
    pub fn level(&self) -> &str {
        self.level.as_deref().unwrap_or("info")
    }

    /// Effective log output format.
    pub fn format(&self) -> logging::Format {
        match self.format.as_deref() {
            Some("json") => logging::Format::Json,
            _ => logging::Format::Plain,
        }
    }
}

// Default implementations

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8500".to_string(),
            service: "vip".to_string(),
            // Mirrors the replica's pod/host name in typical deployments.
            instance: std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string()),
        }
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            reconcile_interval: Duration::from_secs(10),
        }
    }
}

impl Default for KeepalivedSettings {
    fn default() -> Self {
        Self {
            binary: "keepalived".to_string(),
            config_path: PathBuf::from("/etc/keepalived/keepalived.conf"),
            ip_binary: "ip".to_string(),
            stop_timeout: Duration::from_secs(10),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            discovery: DiscoverySettings::default(),
            controller: ControllerSettings::default(),
            keepalived: KeepalivedSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

// Custom validators

fn validate_endpoint(endpoint: &str) -> Result<(), ValidationError> {
    let trimmed = endpoint.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("endpoint_empty"));
    }

    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(ValidationError::new("endpoint_not_http"));
    }

    Ok(())
}

fn validate_reconcile_interval(interval: &Duration) -> Result<(), ValidationError> {
    let secs = interval.as_secs();
    if secs < 1 || secs > 600 {
        return Err(ValidationError::new("reconcile_interval_out_of_range"));
    }
    Ok(())
}

fn validate_config_path(path: &PathBuf) -> Result<(), ValidationError> {
    if path.as_os_str().is_empty() {
        return Err(ValidationError::new("config_path_empty"));
    }
    if path.parent().is_none() {
        return Err(ValidationError::new("config_path_has_no_parent"));
    }
    Ok(())
}

// Settings loading implementation

impl Settings {
    /// Load settings from default search paths
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_settings_file() {
            Some(path) => {
                tracing::info!("Loading settings from: {}", path.display());
                Self::load_from_file(&path)
            }
            None => {
                tracing::info!("No settings file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load settings from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let settings: Settings = serde_yaml::from_str(&contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Find a settings file in standard locations
    fn find_settings_file() -> Option<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/vip-manager/vip-manager.yaml")];

        if let Some(home_path) = Self::home_settings_path() {
            paths.push(home_path);
        }

        paths.push(PathBuf::from("./vip-manager.yaml"));

        paths
            .into_iter()
            .find(|p: &PathBuf| p.exists() && p.is_file())
    }

    /// Get home directory settings path
    fn home_settings_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config/vip-manager/vip-manager.yaml"))
    }
}

use crate::error::{CarecompError, Result};
use crate::gate::FeatureFlags;
use crate::paths;
use crate::status::DUE_SOON_DAYS;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3180
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// RulesConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(default = "default_due_soon_days")]
    pub due_soon_days: i64,
}

fn default_due_soon_days() -> i64 {
    DUE_SOON_DAYS
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            due_soon_days: default_due_soon_days(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: u32,
    pub instance: InstanceConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    /// Flags given to organizations created on this instance.
    #[serde(default)]
    pub default_flags: FeatureFlags,
}

impl Config {
    pub fn new(instance_name: impl Into<String>) -> Self {
        Self {
            version: 1,
            instance: InstanceConfig {
                name: instance_name.into(),
            },
            server: ServerConfig::default(),
            rules: RulesConfig::default(),
            default_flags: FeatureFlags::default(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(CarecompError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.version != 1 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!("unsupported config version {}", self.version),
            });
        }
        if self.instance.name.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "instance.name is empty".to_string(),
            });
        }
        if self.rules.due_soon_days < 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "rules.due_soon_days is {}, must be zero or more",
                    self.rules.due_soon_days
                ),
            });
        } else if self.rules.due_soon_days > 365 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "rules.due_soon_days is {}: nearly everything will show as due soon",
                    self.rules.due_soon_days
                ),
            });
        }
        if self.server.port == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "server.port is 0: an ephemeral port is picked on every start".to_string(),
            });
        }
        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

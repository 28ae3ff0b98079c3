use serde::{Deserialize, Serialize};

/// Configuration from timeblock.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub vault: VaultConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Pressure hint passed to every schedule pass
    #[serde(default)]
    pub high_pressure: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Default: "tasks.toml"
    #[serde(default = "default_vault_file")]
    pub file: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        VaultConfig {
            file: default_vault_file(),
        }
    }
}

fn default_vault_file() -> String {
    "tasks.toml".to_string()
}

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// File extension used by per-guild database files.
pub const STORE_FILE_EXTENSION: &str = "db";

/// Top-level config (scrib.toml + SCRIB_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScribConfig {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Chat-gateway settings. The gateway adapter itself lives outside this
/// workspace's core crates; it only needs the token resolved here.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BotConfig {
    /// Bot authentication token. Override with SCRIB_BOT_TOKEN.
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory holding one SQLite file per guild.
    #[serde(default = "default_guild_data_root")]
    pub guild_data_root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            guild_data_root: default_guild_data_root(),
        }
    }
}

fn default_guild_data_root() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.scrib/guilds", home)
}

impl ScribConfig {
    /// Load config from a TOML file with SCRIB_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.scrib/scrib.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: ScribConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("SCRIB_").split("_"))
            .extract()
            .map_err(|e| crate::error::ScribError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.scrib/scrib.toml", home)
}

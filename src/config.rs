use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::routes::ResponsePolicy;

pub const DEFAULT_CONFIG_PATH: &str = "simplefeed.toml";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Upper bound of the SQLite connection pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default)]
    pub policy: ResponsePolicy,
}

fn default_bind_address() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_database_url() -> String {
    "sqlite:simplefeed.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            database_url: default_database_url(),
            max_connections: default_max_connections(),
            policy: ResponsePolicy::default(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Apply `DATABASE_URL` and `BIND_ADDRESS` on top of the file values.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(addr) = lookup("BIND_ADDRESS") {
            self.bind_address = addr;
        }
        self
    }
}

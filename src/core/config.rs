//! Client configuration with documented defaults
//!
//! Loaded from a TOML file (`.ignite.toml` by default), then overridden
//! from the environment. All tuning constants live here.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::error::{IgniteError, Result};
use crate::core::types::Millis;

/// Default config file name, looked up in the working directory
pub const CONFIG_FILE_NAME: &str = ".ignite.toml";

/// Remote game server address
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Credentials used for the login request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    pub id: String,
    pub pass: String,
}

/// Behavior controller tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Milliseconds between idle movement decisions
    ///
    /// Every time the movement accumulator reaches this value, an idle NPC
    /// either walks back home or takes one random step.
    pub move_freq: Millis,

    /// Milliseconds between idle chatter lines
    pub chat_freq: Millis,

    /// Stop the pass after the first NPC that fully advances
    ///
    /// With this set, at most one NPC reaches the combat step per tick.
    /// Turning it off evaluates every NPC each tick, which changes timing.
    pub single_npc_per_tick: bool,

    /// Flavor lines keyed by race id
    ///
    /// Races without an entry say the text id `random_chat_<race>`.
    pub chat_lines: AHashMap<String, Vec<String>>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            move_freq: 3000,
            chat_freq: 5000,
            single_npc_per_tick: true,
            chat_lines: AHashMap::new(),
        }
    }
}

/// Connection and loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Simulation tick period in milliseconds
    pub tick_ms: Millis,

    /// Longest accepted inbound frame in bytes
    ///
    /// Full module snapshots travel in a single frame, so this is large.
    pub max_frame_len: usize,

    /// How many trade ids the arbitrator remembers for deduplication
    pub trade_memory: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            tick_ms: 16,
            max_frame_len: 100 * 1024 * 1024,
            trade_memory: 1024,
        }
    }
}

/// Complete client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server: ServerConfig,
    pub user: UserConfig,
    pub ai: AiConfig,
    pub client: ClientSettings,
}

impl ClientConfig {
    /// Parse config from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ClientConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Load config from a file, apply environment overrides and validate
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            IgniteError::Config(format!("unable to read {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_toml(&content)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Override connection settings from `IGNITE_*` environment variables
    pub fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("IGNITE_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("IGNITE_SERVER_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %port, "ignoring invalid IGNITE_SERVER_PORT"),
            }
        }
        if let Ok(id) = std::env::var("IGNITE_USER_ID") {
            self.user.id = id;
        }
        if let Ok(pass) = std::env::var("IGNITE_USER_PASS") {
            self.user.pass = pass;
        }
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(IgniteError::Config("server host is empty".into()));
        }
        if self.ai.move_freq == 0 || self.ai.chat_freq == 0 {
            return Err(IgniteError::Config(format!(
                "AI frequencies must be positive (move_freq = {}, chat_freq = {})",
                self.ai.move_freq, self.ai.chat_freq
            )));
        }
        if self.client.tick_ms == 0 {
            return Err(IgniteError::Config("tick_ms must be positive".into()));
        }
        Ok(())
    }
}

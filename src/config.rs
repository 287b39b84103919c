use crate::constants::{DEFAULT_AUDIO_PATH, DEFAULT_COMMAND_PREFIX};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{io::ErrorKind, path::PathBuf};
use tokio::fs::read_to_string;

const CONFIG_PATH: &str = "Config.toml";

/// Environment variable overriding the configured Discord token.
pub const TOKEN_ENV_VAR: &str = "TOKEN";

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PlaybackConfig {
    /// File played when `play` is given no path
    #[serde(default = "default_audio_path")]
    pub default_audio_path: PathBuf,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_audio_path: default_audio_path(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CommandConfig {
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
        }
    }
}

#[derive(Clone, Deserialize, Serialize)]
pub struct DiscordConfig {
    /// Discord bot token
    pub discord_token: String,
}

#[derive(Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(flatten)]
    pub playback: PlaybackConfig,

    #[serde(flatten)]
    pub commands: CommandConfig,

    #[serde(flatten)]
    pub discord: Option<DiscordConfig>,
}

impl Config {
    /// Parse a TOML document. Missing keys fall back to their defaults.
    pub fn from_toml(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Apply overrides from the environment (`TOKEN`).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(token) = std::env::var(TOKEN_ENV_VAR) {
            if !token.is_empty() {
                self.discord = Some(DiscordConfig {
                    discord_token: token,
                });
            }
        }

        self
    }

    pub fn discord_token(&self) -> Option<&str> {
        self.discord
            .as_ref()
            .map(|discord| discord.discord_token.as_str())
            .filter(|token| !token.is_empty())
    }
}

fn default_audio_path() -> PathBuf {
    PathBuf::from(DEFAULT_AUDIO_PATH)
}

fn default_command_prefix() -> String {
    DEFAULT_COMMAND_PREFIX.to_string()
}

/// Load `Config.toml` from the working directory, falling back to defaults
/// when it does not exist.
pub async fn load() -> Result<Config> {
    let config = match read_to_string(CONFIG_PATH).await {
        Ok(config) => Config::from_toml(&config)?,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("No {CONFIG_PATH} found, using defaults");
            Config::default()
        }
        Err(e) => return Err(e.into()),
    };

    Ok(config.with_env_overrides())
}

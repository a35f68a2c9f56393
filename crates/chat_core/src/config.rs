use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Typewriter pacing. Text is revealed at `chars_per_second`, advanced every
/// `tick_interval_ms` and pushed to the renderer at most every
/// `render_interval_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacerConfig {
    #[serde(default = "default_cps")]
    pub chars_per_second: u32,
    #[serde(default = "default_tick_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_render_ms")]
    pub render_interval_ms: u64,
}

fn default_cps() -> u32 {
    80
}

fn default_tick_ms() -> u64 {
    20
}

fn default_render_ms() -> u64 {
    60
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self {
            chars_per_second: default_cps(),
            tick_interval_ms: default_tick_ms(),
            render_interval_ms: default_render_ms(),
        }
    }
}

impl PacerConfig {
    /// Characters revealed per typing tick, never less than one.
    pub fn chars_per_tick(&self) -> usize {
        let exact = f64::from(self.chars_per_second) * self.tick_interval_ms as f64 / 1000.0;
        (exact.round() as usize).max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub pacer: PacerConfig,
}

const CONFIG_FILE_PATH: &str = "branch_chat.toml";

fn default_api_base() -> String {
    "http://localhost:8000".to_string()
}

fn default_temperature() -> f32 {
    1.0
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".branch_chat")
}

fn config_json_path() -> PathBuf {
    config_dir().join("config.json")
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_token: None,
            temperature: default_temperature(),
            pacer: PacerConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load from `~/.branch_chat/config.json`, then `./branch_chat.toml`, then
    /// defaults, and apply `CHAT_*` environment overrides on top.
    pub fn load() -> Self {
        let mut config = [config_json_path(), PathBuf::from(CONFIG_FILE_PATH)]
            .iter()
            .filter(|path| path.exists())
            .find_map(|path| match Self::from_file(path) {
                Ok(config) => Some(config),
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "ignoring unreadable config file");
                    None
                }
            })
            .unwrap_or_default();

        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Read a config file, choosing the format by extension (`.json` or TOML).
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if path.extension().is_some_and(|ext| ext == "json") {
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(toml::from_str(&content)?)
        }
    }

    /// Apply overrides from a variable lookup (normally the process environment).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(api_base) = lookup("CHAT_API_BASE") {
            self.api_base = api_base;
        }
        if let Some(token) = lookup("CHAT_API_TOKEN") {
            self.api_token = Some(token);
        }
        if let Some(value) = parse_env(&lookup, "CHAT_TEMPERATURE") {
            self.temperature = value;
        }
        if let Some(value) = parse_env(&lookup, "CHAT_TYPE_CPS") {
            self.pacer.chars_per_second = value;
        }
        if let Some(value) = parse_env(&lookup, "CHAT_TICK_MS") {
            self.pacer.tick_interval_ms = value;
        }
        if let Some(value) = parse_env(&lookup, "CHAT_RENDER_MS") {
            self.pacer.render_interval_ms = value;
        }
    }
}

fn parse_env<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring invalid environment override");
            None
        }
    }
}

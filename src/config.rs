use crate::estimation::EngineSettings;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use time::{Duration, UtcOffset};

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub server: Option<ServerSection>,
    #[serde(default)]
    pub engine: Option<EngineSection>,
    #[serde(default)]
    pub location_types: Vec<LocationTypeSeed>,
    #[serde(default)]
    pub locations: Vec<LocationSeed>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSection {
    /// Port to listen on (default: 8080)
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct EngineSection {
    /// Minutes of check-ins feeding the live signal (default: 60)
    pub live_window_minutes: Option<u32>,
    /// Minutes a device must wait between check-ins at one location (default: 15)
    pub checkin_cooldown_minutes: Option<u32>,
    /// Service time for locations that do not set one (default: 5)
    pub default_service_time_minutes: Option<u32>,
    /// Offset of the wall clock used for day/hour buckets (default: 0, UTC)
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LocationTypeSeed {
    pub name: String,
    pub icon: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LocationSeed {
    pub name: String,
    pub address: String,
    /// Name of a `[[location_types]]` entry.
    #[serde(rename = "type")]
    pub location_type: String,
    pub average_service_time: Option<u32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}

impl Config {
    /// Returns the server port (default: 8080)
    pub fn server_port(&self) -> u16 {
        self.server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    pub fn log_level(&self) -> &str {
        let level = self.logging.level.trim();
        if level.is_empty() {
            DEFAULT_LOG_LEVEL
        } else {
            level
        }
    }

    /// Builds engine tunables, falling back to defaults for unset keys.
    pub fn engine_settings(&self) -> Result<EngineSettings, ConfigError> {
        let defaults = EngineSettings::default();
        let Some(section) = self.engine.as_ref() else {
            return Ok(defaults);
        };

        let utc_offset = match section.utc_offset_minutes {
            Some(minutes) => UtcOffset::from_whole_seconds(minutes.saturating_mul(60))
                .map_err(|err| {
                    ConfigError::Invalid(format!("engine.utc_offset_minutes {minutes}: {err}"))
                })?,
            None => defaults.utc_offset,
        };

        let default_service_time = section
            .default_service_time_minutes
            .unwrap_or(defaults.default_service_time);
        if default_service_time == 0 {
            return Err(ConfigError::Invalid(
                "engine.default_service_time_minutes must be positive".to_string(),
            ));
        }

        Ok(EngineSettings {
            live_window: section
                .live_window_minutes
                .map(|m| Duration::minutes(i64::from(m)))
                .unwrap_or(defaults.live_window),
            checkin_cooldown: section
                .checkin_cooldown_minutes
                .map(|m| Duration::minutes(i64::from(m)))
                .unwrap_or(defaults.checkin_cooldown),
            default_service_time,
            utc_offset,
        })
    }
}

//! Configuration loading and validation.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "*".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

/// Fallbacks for schedule options a caller leaves out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingDefaults {
    /// "HH:MM"
    #[serde(default = "default_day_start")]
    pub day_start: String,

    /// "HH:MM"; slots must end by this time
    #[serde(default = "default_day_end")]
    pub day_end: String,

    #[serde(default = "default_duration_min")]
    pub duration_min: u32,

    #[serde(default = "default_courts")]
    pub courts: u32,

    #[serde(default = "default_referees")]
    pub referees: u32,
}

fn default_day_start() -> String {
    "09:00".to_string()
}

fn default_day_end() -> String {
    "18:00".to_string()
}

fn default_duration_min() -> u32 {
    45
}

fn default_courts() -> u32 {
    2
}

fn default_referees() -> u32 {
    2
}

impl Default for SchedulingDefaults {
    fn default() -> Self {
        Self {
            day_start: default_day_start(),
            day_end: default_day_end(),
            duration_min: default_duration_min(),
            courts: default_courts(),
            referees: default_referees(),
        }
    }
}

/// Parse "HH:MM" (or "HH:MM:SS").
pub fn parse_clock(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

impl SchedulingDefaults {
    /// Parsed day window.
    pub fn window(&self) -> Result<(NaiveTime, NaiveTime), ConfigError> {
        let parse = |label: &str, value: &str| {
            parse_clock(value).ok_or_else(|| {
                ConfigError::ValidationError(format!("{label} must be HH:MM, got {value:?}"))
            })
        };
        Ok((
            parse("day_start", &self.day_start)?,
            parse("day_end", &self.day_end)?,
        ))
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub scheduling: SchedulingDefaults,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            server: ServerConfig::default(),
            scheduling: SchedulingDefaults::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        let scheduling = &self.scheduling;
        if scheduling.duration_min == 0 {
            return Err(ConfigError::ValidationError(
                "Slot length must be greater than 0".to_string(),
            ));
        }

        if scheduling.courts == 0 || scheduling.referees == 0 {
            return Err(ConfigError::ValidationError(
                "At least one court and one referee are required".to_string(),
            ));
        }

        let (start, end) = scheduling.window()?;
        let minutes = (end - start).num_minutes();
        if minutes < i64::from(scheduling.duration_min) {
            return Err(ConfigError::ValidationError(format!(
                "Day window {}-{} is shorter than one {}-minute slot",
                scheduling.day_start, scheduling.day_end, scheduling.duration_min
            )));
        }

        Ok(())
    }
}

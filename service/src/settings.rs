//! Process settings loaded from the environment
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::str::FromStr;

use log::LevelFilter;
use thiserror::Error;

pub const DEFAULT_SERVICE_NAME: &str = "ml-service";
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}: expected {expected}")]
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str, expected: &'static str) -> Self {
        ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            expected,
        }
    }
}

/// Log line layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub service_name: String,
    pub debug: bool,
    pub log_level: LevelFilter,
    pub log_format: LogFormat,
    pub max_concurrent_requests: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            debug: true,
            log_level: LevelFilter::Info,
            log_format: LogFormat::Json,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
        }
    }
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, raw, "a boolean")),
    }
}

fn parse_level(raw: &str) -> Result<LevelFilter, ConfigError> {
    let level = raw.trim();
    // WARNING and CRITICAL are accepted as level aliases
    match level.to_ascii_uppercase().as_str() {
        "WARNING" => return Ok(LevelFilter::Warn),
        "CRITICAL" => return Ok(LevelFilter::Error),
        _ => {}
    }
    LevelFilter::from_str(level)
        .map_err(|_| ConfigError::invalid("LOG_LEVEL", raw, "one of OFF, ERROR, WARN, INFO, DEBUG, TRACE"))
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();

        if let Some(name) = lookup("SERVICE_NAME") {
            settings.service_name = name;
        }
        if let Some(raw) = lookup("DEBUG") {
            settings.debug = parse_bool("DEBUG", &raw)?;
        }
        if let Some(raw) = lookup("LOG_LEVEL") {
            settings.log_level = parse_level(&raw)?;
        }
        if let Some(raw) = lookup("LOG_FORMAT") {
            settings.log_format = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid("LOG_FORMAT", &raw, "text or json"))?;
        }
        if let Some(raw) = lookup("MAX_CONCURRENT_REQUESTS") {
            settings.max_concurrent_requests = match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::invalid("MAX_CONCURRENT_REQUESTS", &raw, "a positive integer")),
            };
        }

        Ok(settings)
    }
}

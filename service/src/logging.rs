//! env_logger setup with an optional JSON line format
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::io::Write;

use chrono::{SecondsFormat, Utc};
use env_logger::{Builder, Env};
use log::{Record, SetLoggerError};
use serde_json::{json, Value};

use crate::settings::{LogFormat, Settings};

/// One JSON log object
pub fn json_record(record: &Record<'_>) -> Value {
    json!({
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "level": record.level().to_string(),
        "logger": record.target(),
        "message": record.args().to_string(),
    })
}

/// Logger builder for the given settings. `RUST_LOG`, when set, overrides `LOG_LEVEL`.
pub fn builder(settings: &Settings) -> Builder {
    let mut builder = Builder::new();
    builder.filter_level(settings.log_level);
    builder.parse_env(Env::default());

    if settings.log_format == LogFormat::Json {
        builder.format(|buf, record| writeln!(buf, "{}", json_record(record)));
    }

    builder
}

/// Install the process logger; fails if one is already installed
pub fn init(settings: &Settings) -> Result<(), SetLoggerError> {
    builder(settings).try_init()
}

//! Process shell for the senior-worker scoring core
//!
//! Loads [`settings::Settings`] from the environment, installs the logger
//! and feeds JSON-lines requests through [`dispatch::Dispatcher`].
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod dispatch;
pub mod logging;
pub mod settings;

pub use self::dispatch::{Dispatcher, Envelope, Reply, RequestKind};
pub use self::settings::{ConfigError, LogFormat, Settings};

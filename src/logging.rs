// src/logging.rs
//! Process-wide `tracing` subscriber setup

use crate::config::LogSettings;
use crate::error::{BoardError, BoardResult};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Map a numeric level to a filter directive. `0` is the most verbose,
/// `6` disables logging; out-of-range values are clamped.
pub fn level_from_number(level: i32) -> &'static str {
    match level.clamp(0, 6) {
        0 => "trace",
        1 => "debug",
        2 => "info",
        3 => "warn",
        4 | 5 => "error",
        _ => "off",
    }
}

/// Parse a level name or `EnvFilter` directive
pub fn parse_filter(directive: &str) -> Result<EnvFilter, String> {
    let directive = directive.trim();
    if directive.is_empty() {
        return Err("empty log level".to_string());
    }
    EnvFilter::try_new(directive).map_err(|e| e.to_string())
}

/// Install the global subscriber. `RUST_LOG` wins over `settings.level`.
/// Fails if a subscriber is already installed.
pub fn init(settings: &LogSettings) -> BoardResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => parse_filter(&settings.level).map_err(BoardError::Config)?,
    };

    let installed = match &settings.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| BoardError::Config(format!("log file {}: {}", path.display(), e)))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .try_init()
        }
        None => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };
    installed.map_err(|e| BoardError::Config(format!("logger: {}", e)))
}

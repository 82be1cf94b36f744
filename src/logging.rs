//! Tracing setup and secret masking.
//!
//! The library only emits `tracing` events; installing a subscriber is left to
//! the binary (or the embedding application) through [`init_tracing`].

use std::env;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Plain,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "momo_mtn=info".to_string(),
            format: LogFormat::Plain,
        }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            level: env::var("LOG_LEVEL").unwrap_or(defaults.level),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_default()
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => defaults.format,
            },
        }
    }
}

/// Install a global subscriber configured from the environment.
pub fn init_tracing() {
    init_tracing_with(&LoggingConfig::from_env());
}

/// Install a global subscriber. `RUST_LOG` wins over `config.level` when set.
/// Calling this twice is harmless; the second call is ignored.
pub fn init_tracing_with(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let _ = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Plain => builder.try_init(),
    };
}

/// Keep the first few characters of a secret for correlation, hide the rest.
pub fn mask_secret(secret: &str) -> String {
    const VISIBLE: usize = 6;
    if secret.chars().count() <= VISIBLE * 2 {
        return "****".to_string();
    }
    let prefix: String = secret.chars().take(VISIBLE).collect();
    format!("{}...", prefix)
}

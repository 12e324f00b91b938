//! Logging configuration and initialization

use std::path::PathBuf;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

pub use tracing_appender::non_blocking::WorkerGuard as LogGuard;

/// Filter variable, checked before `RUST_LOG`
pub const LOG_ENV: &str = "LIGHTSCRIPT_LOG";
/// Set to `json` for JSON lines on the console
pub const LOG_FORMAT_ENV: &str = "LIGHTSCRIPT_LOG_FORMAT";

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub console_enabled: bool,
    pub file_enabled: bool,
    /// Log file; defaults to `lightscript.log` in the working directory
    pub file_path: Option<PathBuf>,
    pub json_format: bool,
    /// Filter used when neither environment variable is set
    pub default_level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_enabled: true,
            file_enabled: false,
            file_path: None,
            json_format: false,
            default_level: "info".to_string(),
        }
    }
}

impl LogConfig {
    /// Console logging at `debug` for the crate when `verbose`, `info` otherwise
    pub fn for_cli(verbose: bool, log_file: Option<PathBuf>) -> Self {
        Self {
            file_enabled: log_file.is_some(),
            file_path: log_file,
            default_level: if verbose { "info,lightscript=debug" } else { "info" }.to_string(),
            ..Self::default()
        }
    }

    fn use_json(&self) -> bool {
        std::env::var(LOG_FORMAT_ENV)
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(self.json_format)
    }
}

/// Install the global subscriber
///
/// The returned guard flushes the file writer on drop; keep it alive for
/// the whole run when file logging is enabled.
pub fn init_logging(config: &LogConfig) -> Result<Option<LogGuard>, Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(&config.default_level));
    let use_json = config.use_json();

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let mut file_guard = None;

    if config.file_enabled {
        let log_path = config
            .file_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("lightscript.log"));
        let file = std::fs::File::create(&log_path)?;
        let (writer, guard) = tracing_appender::non_blocking(file);
        file_guard = Some(guard);

        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false);

        if config.console_enabled {
            let console_layer = fmt::layer().with_target(true).compact();
            subscriber.with(file_layer).with(console_layer).try_init()?;
        } else {
            subscriber.with(file_layer).try_init()?;
        }
        eprintln!("Logging to file: {}", log_path.display());
    } else if config.console_enabled && use_json {
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true);
        subscriber.with(json_layer).try_init()?;
    } else if config.console_enabled {
        let console_layer = fmt::layer().with_target(true).compact();
        subscriber.with(console_layer).try_init()?;
    } else {
        subscriber.try_init()?;
    }

    tracing::info!(
        target: "lightscript",
        version = env!("CARGO_PKG_VERSION"),
        json_format = use_json,
        file_enabled = config.file_enabled,
        "Logging initialized"
    );

    Ok(file_guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert!(config.console_enabled);
        assert!(!config.file_enabled);
        assert_eq!(config.default_level, "info");
    }

    #[test]
    fn test_cli_config() {
        let config = LogConfig::for_cli(true, Some(PathBuf::from("run.log")));
        assert!(config.file_enabled);
        assert_eq!(config.default_level, "info,lightscript=debug");
        assert!(!LogConfig::for_cli(false, None).file_enabled);
    }
}

use aw_models::AwError;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Lets the config watcher change the log level of a running process.
#[derive(Clone)]
pub struct LogLevelHandle {
    handle: reload::Handle<EnvFilter, Registry>,
}

impl LogLevelHandle {
    pub fn set(&self, level: &str) -> Result<(), AwError> {
        let filter = parse_filter(level)?;
        self.handle.reload(filter).map_err(|e| AwError::ConfigError {
            reason: format!("cannot change log level: {}", e),
        })
    }
}

pub struct TracingService;

impl TracingService {
    /// Installs the global subscriber. `RUST_LOG` wins over the configured level.
    pub fn init(level: Option<&str>) -> Result<LogLevelHandle, AwError> {
        let filter = match std::env::var("RUST_LOG") {
            Ok(directives) if !directives.trim().is_empty() => parse_filter(&directives)?,
            _ => parse_filter(level.unwrap_or("info"))?,
        };

        let (filter, handle) = reload::Layer::new(filter);
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init()
            .map_err(|e| AwError::InternalError { reason: e.to_string() })?;

        Ok(LogLevelHandle { handle })
    }
}

/// Maps level names as they appear in config files onto filter directives.
/// `DEBUG` becomes `debug`, `WARNING` becomes `warn`; anything that already
/// looks like a directive (`aw_api=debug,info`) is passed through.
pub fn normalize_level(level: &str) -> String {
    let trimmed = level.trim();
    if trimmed.contains('=') || trimmed.contains(',') {
        return trimmed.to_string();
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" | "fatal" => "error".to_string(),
        "notset" => "trace".to_string(),
        other => other.to_string(),
    }
}

/// Checks a configured level without applying it.
pub fn validate_level(level: &str) -> Result<(), AwError> {
    parse_filter(level).map(|_| ())
}

fn parse_filter(level: &str) -> Result<EnvFilter, AwError> {
    EnvFilter::try_new(normalize_level(level)).map_err(|e| AwError::ConfigError {
        reason: format!("invalid log level {:?}: {}", level, e),
    })
}

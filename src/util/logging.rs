//! Structured logging setup
//!
//! Initialization for the `tracing` ecosystem: pretty console output by
//! default, JSON for production-style structured logs, configured via
//! `DOCKHAND_LOG_LEVEL` / `DOCKHAND_LOG_JSON` and standard `RUST_LOG`
//! filtering. Initialization is guarded and only happens once.

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum log level to display.
    pub level: Level,

    /// Use JSON output instead of pretty console formatting.
    pub use_json: bool,

    /// Include the module target in log lines.
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: true,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }
}

/// Parses a log level string, defaulting to INFO on anything unknown.
pub fn parse_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initializes the tracing subscriber. Subsequent calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = EnvFilter::from_default_env()
            .add_directive(format!("dockhand={}", config.level).parse().unwrap());

        if config.use_json {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_target(config.include_target))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(config.include_target))
                .init();
        }
    });
}

/// Initializes logging with defaults (INFO, console output).
pub fn init_default() {
    init_logging(LoggingConfig::default());
}

/// Initializes logging from `DOCKHAND_LOG_LEVEL` and `DOCKHAND_LOG_JSON`.
pub fn init_from_env() {
    let level = parse_level(&env::var("DOCKHAND_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()));
    let use_json = env::var("DOCKHAND_LOG_JSON")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    init_logging(LoggingConfig {
        level,
        use_json,
        ..Default::default()
    });
}

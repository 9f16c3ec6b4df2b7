//! Logging initialization and configuration.
//!
//! Uses the `tracing` ecosystem for structured logging with support for
//! both human-readable and JSON output formats, plus the breadcrumb layer
//! that feeds crash reports.

use mediathumb_core::telemetry::{BreadcrumbLayer, JsonlCrashReporter};
use mediathumb_core::Config;
use std::sync::Arc;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

/// Initialize the logging subsystem.
///
/// # Arguments
///
/// * `level` - Default level directive when `RUST_LOG` is unset.
/// * `json_format` - If true, outputs structured JSON logs; otherwise pretty-printed.
/// * `breadcrumbs` - Breadcrumb layer to install alongside the formatter.
///
/// # Notes
///
/// - Log output goes to stderr (stdout is reserved for data output)
/// - The RUST_LOG environment variable can override the log level
/// - Breadcrumbs always see INFO and above, whatever the console level
pub fn init(level: &str, json_format: bool, breadcrumbs: Option<BreadcrumbLayer>) {
    // Build the filter, respecting RUST_LOG if set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let breadcrumbs = breadcrumbs.map(|layer| layer.with_filter(LevelFilter::INFO));

    if json_format {
        // JSON format for machine parsing
        tracing_subscriber::registry()
            .with(breadcrumbs)
            .with(fmt::layer().json().with_writer(std::io::stderr).with_filter(filter))
            .init();
    } else {
        // Pretty format for humans
        tracing_subscriber::registry()
            .with(breadcrumbs)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_filter(filter),
            )
            .init();
    }
}

/// Initialize logging with configuration from Config.
///
/// Crash reports are only written when `logging.crash_report_path` is set.
pub fn init_from_config(config: &Config, verbose_override: bool, json_logs_override: bool) {
    let level = if verbose_override {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let json_format = json_logs_override || config.logging.format == "json";

    let breadcrumbs = config.crash_report_path().map(|path| {
        BreadcrumbLayer::new(config.logging.breadcrumbs)
            .with_reporter(Arc::new(JsonlCrashReporter::new(path)))
    });

    init(level, json_format, breadcrumbs);
}

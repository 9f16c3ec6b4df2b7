//! A `tracing` layer that keeps breadcrumbs and reports logged errors.

use std::fmt::{self, Write as _};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use super::buffer::{LogBuffer, LogEntry};
use super::report::{CrashReport, CrashReporter, Severity};

/// Records INFO-and-above events into a [`LogBuffer`].
///
/// When a WARN or ERROR event carries an `error` field, the buffered history
/// is attached to a [`CrashReport`] and passed to the configured reporter:
///
/// ```rust,ignore
/// tracing::warn!(error = %e, "Thumbnail load failed");
/// ```
pub struct BreadcrumbLayer {
    buffer: Arc<LogBuffer>,
    reporter: Option<Arc<dyn CrashReporter>>,
    process_name: String,
}

impl BreadcrumbLayer {
    pub fn new(capacity: usize) -> Self {
        Self::with_buffer(Arc::new(LogBuffer::new(capacity)))
    }

    /// Use an existing buffer, e.g. one the caller also reads from.
    pub fn with_buffer(buffer: Arc<LogBuffer>) -> Self {
        Self {
            buffer,
            reporter: None,
            process_name: current_process_name(),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn CrashReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn buffer(&self) -> &Arc<LogBuffer> {
        &self.buffer
    }

    fn report(&self, reporter: &dyn CrashReporter, severity: Severity, message: &str, error: String) {
        let mut report = CrashReport::new(severity, message, error);
        report.add_to_tab("App", "processName", self.process_name.as_str());
        // Keys are zero-padded to a common width so they sort in insertion order.
        let width = log_key_width(self.buffer.capacity());
        for (index, entry) in self.buffer.snapshot().iter().enumerate() {
            report.add_to_tab("Log", format!("{index:0width$}"), entry.to_string());
        }
        reporter.notify(report);
    }
}

impl<S: Subscriber> Layer<S> for BreadcrumbLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        // DEBUG and TRACE are noise in a crash report.
        if level > Level::INFO {
            return;
        }

        let mut fields = EventFields::default();
        event.record(&mut fields);
        let line = fields.line();

        self.buffer.push(LogEntry::new(level, line.clone()));

        if let (Some(reporter), Some(severity), Some(error)) = (
            self.reporter.as_deref(),
            Severity::from_level(level),
            fields.error,
        ) {
            self.report(reporter, severity, &fields.message, error);
        }
    }
}

#[derive(Default)]
struct EventFields {
    message: String,
    error: Option<String>,
    // Remaining fields, pre-rendered as ` key=value`.
    extra: String,
}

impl EventFields {
    fn line(&self) -> String {
        let mut line = self.message.clone();
        if let Some(error) = &self.error {
            let _ = write!(line, " error={error}");
        }
        line.push_str(&self.extra);
        line
    }
}

impl Visit for EventFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "error" => self.error = Some(value.to_string()),
            name => {
                let _ = write!(self.extra, " {name}={value}");
            }
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{value:?}"),
            "error" => self.error = Some(format!("{value:?}")),
            name => {
                let _ = write!(self.extra, " {name}={value:?}");
            }
        }
    }
}

fn log_key_width(capacity: usize) -> usize {
    capacity.saturating_sub(1).to_string().len().max(3)
}

fn current_process_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::report::MemoryCrashReporter;
    use tracing_subscriber::prelude::*;

    fn capture(capacity: usize, f: impl FnOnce()) -> (Arc<LogBuffer>, Arc<MemoryCrashReporter>) {
        let reporter = Arc::new(MemoryCrashReporter::new());
        let layer = BreadcrumbLayer::new(capacity).with_reporter(reporter.clone());
        let buffer = Arc::clone(layer.buffer());
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, f);
        (buffer, reporter)
    }

    #[test]
    fn test_buffers_info_and_above_only() {
        let (buffer, reporter) = capture(10, || {
            tracing::trace!("trace");
            tracing::debug!("debug");
            tracing::info!("info");
            tracing::warn!("warn");
            tracing::error!("error");
        });

        let lines: Vec<_> = buffer.snapshot().into_iter().map(|e| e.message).collect();
        assert_eq!(lines, vec!["info", "warn", "error"]);
        // No error field, nothing to report.
        assert!(reporter.is_empty());
    }

    #[test]
    fn test_overflow_keeps_last_entries() {
        let (buffer, _) = capture(10, || {
            for i in 0..15 {
                tracing::info!("line {}", i);
            }
        });

        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.len(), 10);
        assert_eq!(snapshot[0].message, "line 5");
        assert_eq!(snapshot[9].message, "line 14");
    }

    #[test]
    fn test_error_attaches_history() {
        let (_, reporter) = capture(10, || {
            for i in 0..15 {
                tracing::info!("line {}", i);
            }
            tracing::error!(error = "disk full", "write failed");
        });

        let reports = reporter.reports();
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.severity, Severity::Error);
        assert_eq!(report.message, "write failed");
        assert_eq!(report.error, "disk full");
        assert!(report.tab("App").unwrap().contains_key("processName"));

        let log = report.tab("Log").unwrap();
        assert_eq!(log.len(), 10);
        assert!(log["000"].ends_with("I: line 6"));
        assert!(log["008"].ends_with("I: line 14"));
        assert!(log["009"].ends_with("E: write failed error=disk full"));
    }

    #[test]
    fn test_warning_with_display_error() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "timed out");
        let (_, reporter) = capture(5, || {
            tracing::warn!(error = %err, key = "content://media/1[8, 8]", "Thumbnail load failed");
        });

        let reports = reporter.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].severity, Severity::Warning);
        assert_eq!(reports[0].error, "timed out");
        assert!(reports[0].tab("Log").unwrap()["000"].contains("key=content://media/1[8, 8]"));
    }

    #[test]
    fn test_info_with_error_is_not_reported() {
        let (buffer, reporter) = capture(5, || {
            tracing::info!(error = "minor", "recovered");
        });
        assert_eq!(buffer.len(), 1);
        assert!(reporter.is_empty());
    }

    #[test]
    fn test_log_key_width() {
        assert_eq!(log_key_width(1), 3);
        assert_eq!(log_key_width(200), 3);
        assert_eq!(log_key_width(1000), 3);
        assert_eq!(log_key_width(1001), 4);
    }

    #[test]
    fn test_large_history_keeps_insertion_order() {
        let (_, reporter) = capture(1005, || {
            for i in 0..1004 {
                tracing::info!("line {}", i);
            }
            tracing::error!(error = "boom", "last");
        });

        let report = &reporter.reports()[0];
        let log = report.tab("Log").unwrap();
        assert_eq!(log.len(), 1005);
        assert!(log.contains_key("0000"));
        assert!(log.contains_key("1004"));

        let values: Vec<_> = log.values().collect();
        assert!(values[0].ends_with("I: line 0"));
        assert!(values[101].ends_with("I: line 101"));
        assert!(values[1004].ends_with("E: last error=boom"));

        // Serialized order follows the keys.
        let json = serde_json::to_string(report).unwrap();
        let older = json.find("I: line 101\"").unwrap();
        let newest = json.find("E: last").unwrap();
        assert!(older < newest);
    }
}

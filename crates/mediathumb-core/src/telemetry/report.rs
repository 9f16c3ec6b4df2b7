//! Crash reports and the sinks that receive them.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::Level;

/// Severity attached to a crash report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    /// Severity for an event level. Levels below WARN are not reportable.
    pub fn from_level(level: Level) -> Option<Self> {
        match level {
            Level::ERROR => Some(Self::Error),
            Level::WARN => Some(Self::Warning),
            _ => None,
        }
    }
}

/// A reported error together with the context captured when it was logged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrashReport {
    pub severity: Severity,
    pub message: String,
    pub error: String,
    pub timestamp_ms: i64,
    /// Named sections of key/value metadata.
    pub tabs: BTreeMap<String, BTreeMap<String, String>>,
}

impl CrashReport {
    pub fn new(severity: Severity, message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            error: error.into(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            tabs: BTreeMap::new(),
        }
    }

    pub fn add_to_tab(&mut self, tab: &str, key: impl Into<String>, value: impl Into<String>) {
        self.tabs
            .entry(tab.to_string())
            .or_default()
            .insert(key.into(), value.into());
    }

    pub fn tab(&self, tab: &str) -> Option<&BTreeMap<String, String>> {
        self.tabs.get(tab)
    }
}

/// Receives crash reports.
///
/// Called from inside the tracing subscriber, so implementations must not
/// log through `tracing` themselves.
pub trait CrashReporter: Send + Sync {
    fn notify(&self, report: CrashReport);
}

/// Appends each report as one JSON line to a file.
#[derive(Debug)]
pub struct JsonlCrashReporter {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlCrashReporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, report: &CrashReport) -> std::io::Result<()> {
        let line = serde_json::to_string(report)?;
        let _guard = self.lock.lock();
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")
    }
}

impl CrashReporter for JsonlCrashReporter {
    fn notify(&self, report: CrashReport) {
        if let Err(e) = self.append(&report) {
            eprintln!(
                "Failed to write crash report to {}: {}",
                self.path.display(),
                e
            );
        }
    }
}

/// Keeps reports in memory.
#[derive(Debug, Default)]
pub struct MemoryCrashReporter {
    reports: Mutex<Vec<CrashReport>>,
}

impl MemoryCrashReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<CrashReport> {
        self.reports.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CrashReporter for MemoryCrashReporter {
    fn notify(&self, report: CrashReport) {
        self.reports.lock().push(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_severity_from_level() {
        assert_eq!(Severity::from_level(Level::ERROR), Some(Severity::Error));
        assert_eq!(Severity::from_level(Level::WARN), Some(Severity::Warning));
        assert_eq!(Severity::from_level(Level::INFO), None);
    }

    #[test]
    fn test_tabs() {
        let mut report = CrashReport::new(Severity::Error, "load failed", "io error");
        report.add_to_tab("App", "processName", "mediathumb");
        report.add_to_tab("Log", "000", "first");
        report.add_to_tab("Log", "001", "second");

        assert_eq!(report.tab("App").unwrap()["processName"], "mediathumb");
        let log: Vec<_> = report.tab("Log").unwrap().values().cloned().collect();
        assert_eq!(log, vec!["first", "second"]);
        assert!(report.tab("Device").is_none());
    }

    #[test]
    fn test_jsonl_reporter_appends_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reports").join("crash.jsonl");
        let reporter = JsonlCrashReporter::new(&path);

        reporter.notify(CrashReport::new(Severity::Warning, "one", "e1"));
        reporter.notify(CrashReport::new(Severity::Error, "two", "e2"));

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["severity"], "error");
        assert_eq!(second["message"], "two");
        assert_eq!(second["error"], "e2");
    }

    #[test]
    fn test_memory_reporter() {
        let reporter = MemoryCrashReporter::new();
        assert!(reporter.is_empty());
        reporter.notify(CrashReport::new(Severity::Error, "boom", "oops"));
        assert_eq!(reporter.len(), 1);
        assert_eq!(reporter.reports()[0].message, "boom");
    }
}

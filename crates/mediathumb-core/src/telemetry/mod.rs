//! Breadcrumb telemetry.
//!
//! Keeps a bounded history of recent log lines and attaches it to crash
//! reports whenever an error is logged at WARN or above.
//!
//! - **buffer**: The fixed-capacity log ring
//! - **report**: Crash reports and reporters
//! - **layer**: The `tracing_subscriber` layer tying both together

pub mod buffer;
pub mod layer;
pub mod report;

pub use buffer::{LogBuffer, LogEntry, DEFAULT_CAPACITY};
pub use layer::BreadcrumbLayer;
pub use report::{CrashReport, CrashReporter, JsonlCrashReporter, MemoryCrashReporter, Severity};

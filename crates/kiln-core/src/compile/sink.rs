//! Diagnostic sinks for compiler output.

use std::sync::{Arc, Mutex};

/// Severity inferred for a block of compiler output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

/// Receives compiler output and driver notices.
///
/// Messages are forwarded verbatim, including trailing newlines. They are
/// never interpreted as format strings. Called from the output pump thread,
/// so implementations must be thread-safe.
pub trait DiagnosticSink: Send + Sync {
    /// Informational output.
    fn info(&self, message: &str);

    /// Output classified as an error.
    fn error(&self, message: &str);

    /// Dispatch a message by severity.
    fn log(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => self.info(message),
            Severity::Error => self.error(message),
        }
    }
}

/// Forwards diagnostics to `tracing` under the `kiln::compiler` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn info(&self, message: &str) {
        tracing::info!(target: "kiln::compiler", "{}", message.trim_end());
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "kiln::compiler", "{}", message.trim_end());
    }
}

/// One recorded diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

/// Records every diagnostic in memory.
///
/// Clones share the same record, so one clone can be handed to the driver
/// while another is inspected by the caller.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    entries: Arc<Mutex<Vec<Diagnostic>>>,
}

impl RecordingSink {
    /// Create an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded diagnostics, in arrival order.
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }

    /// Recorded diagnostics with the given severity.
    pub fn with_severity(&self, severity: Severity) -> Vec<Diagnostic> {
        self.lock()
            .iter()
            .filter(|d| d.severity == severity)
            .cloned()
            .collect()
    }

    /// Number of error diagnostics recorded.
    pub fn error_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    /// Remove all recorded diagnostics.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Diagnostic>> {
        // The record stays consistent even if a holder panicked.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, severity: Severity, message: &str) {
        self.lock().push(Diagnostic {
            severity,
            message: message.to_string(),
        });
    }
}

impl DiagnosticSink for RecordingSink {
    fn info(&self, message: &str) {
        self.push(Severity::Info, message);
    }

    fn error(&self, message: &str) {
        self.push(Severity::Error, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_shares_entries() {
        let sink = RecordingSink::new();
        let clone = sink.clone();

        clone.info("building\n");
        clone.log(Severity::Error, "a.cpp:1: error: nope\n");

        assert_eq!(sink.entries().len(), 2);
        assert_eq!(sink.error_count(), 1);
        assert_eq!(
            sink.with_severity(Severity::Info)[0].message,
            "building\n".to_string()
        );

        sink.clear();
        assert!(clone.entries().is_empty());
    }

    #[test]
    fn test_messages_are_not_format_strings() {
        let sink = RecordingSink::new();
        sink.info("%s {} {0}");
        assert_eq!(sink.entries()[0].message, "%s {} {0}");
    }
}

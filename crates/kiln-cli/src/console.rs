//! Terminal output: colors and the console diagnostic sink.

use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};

use kiln_core::DiagnosticSink;

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";
pub const RED: &str = "\x1b[31m";

/// Prints toolchain output as it arrives.
///
/// Informational output goes to stdout, errors to stderr in red. Errors
/// are counted so a build can be judged once it completes.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    errors: AtomicUsize,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Errors reported since the last reset.
    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }

    /// Start counting for a new build.
    pub fn reset(&self) {
        self.errors.store(0, Ordering::Relaxed);
    }
}

impl DiagnosticSink for ConsoleSink {
    fn info(&self, message: &str) {
        let mut out = io::stdout().lock();
        let _ = write!(out, "{}{}", message, line_end(message));
        let _ = out.flush();
    }

    fn error(&self, message: &str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        let mut err = io::stderr().lock();
        let _ = write!(err, "{}{}{}{}", RED, message, RESET, line_end(message));
    }
}

/// Newline for messages that lack one, so the next message starts on its own line.
fn line_end(message: &str) -> &'static str {
    if message.ends_with('\n') { "" } else { "\n" }
}

/// Print a section header.
pub fn header(title: &str, subject: &str) {
    println!(
        "\n{}{}{} - {}{}{}",
        BOLD, title, RESET, CYAN, subject, RESET
    );
    println!("{}", "─".repeat(50));
}

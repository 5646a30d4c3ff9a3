//! Output pump: drains the shell's merged output on a background thread.
//!
//! The pump is the only writer of a channel's [`CompletionSignal`]. It
//! detects the completion token echoed after each command, classifies all
//! other text by severity, and forwards it to the diagnostic sink in the
//! order the toolchain produced it.

use std::io::{ErrorKind, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crate::error::{Error, Result};

use super::sink::{DiagnosticSink, Severity};

/// Token echoed by the shell once the preceding command has finished.
pub const DEFAULT_COMPLETION_TOKEN: &str = "_KILN_COMPLETION_TOKEN_";

/// Size of a single read from the output pipe.
const READ_CHUNK: usize = 1024;

/// Markers that classify output as an error.
///
/// Covers both `file(10) : error C2065` style and `file:10: error:` style
/// diagnostics.
pub fn default_error_markers() -> Vec<String> {
    [" : error ", " : fatal error ", ": error:", ": fatal error:"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Classify a block of output.
pub fn classify(text: &str, error_markers: &[String]) -> Severity {
    if error_markers.iter().any(|marker| text.contains(marker.as_str())) {
        Severity::Error
    } else {
        Severity::Info
    }
}

/// Completion flag shared between a pump (writer) and the driver (reader).
#[derive(Debug, Clone, Default)]
pub struct CompletionSignal {
    complete: Arc<AtomicBool>,
}

impl CompletionSignal {
    /// Create an unset signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether completion has been signalled.
    pub fn is_set(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    pub(crate) fn set(&self) {
        self.complete.store(true, Ordering::Release);
    }

    pub(crate) fn reset(&self) {
        self.complete.store(false, Ordering::Release);
    }
}

/// What one chunk of output turned into.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ScanOutput {
    /// Text released for forwarding (may be empty).
    pub text: String,

    /// Number of completion tokens found.
    pub completions: usize,
}

/// Finds the completion token in a stream of arbitrarily split chunks.
///
/// Bytes that might be the start of a token, or of a multi-byte UTF-8
/// character, are held back until the next chunk decides them.
#[derive(Debug)]
pub struct SentinelScanner {
    token: Vec<u8>,
    pending: Vec<u8>,
    skipping_line: bool,
}

impl SentinelScanner {
    /// Create a scanner for the given token.
    pub fn new(token: &str) -> Self {
        Self {
            token: token.as_bytes().to_vec(),
            pending: Vec::new(),
            skipping_line: false,
        }
    }

    /// Feed one chunk of output.
    pub fn feed(&mut self, chunk: &[u8]) -> ScanOutput {
        let mut released = Vec::new();
        let mut completions = 0;
        let mut input = chunk.to_vec();

        loop {
            if self.skipping_line {
                // The rest of the token's line is the echo's own newline.
                match input.iter().position(|&b| b == b'\n') {
                    Some(newline) => {
                        input.drain(..=newline);
                        self.skipping_line = false;
                    }
                    None => break,
                }
            }

            self.pending.append(&mut input);

            match find(&self.pending, &self.token) {
                Some(at) => {
                    released.extend_from_slice(&self.pending[..at]);
                    input = self.pending.split_off(at + self.token.len());
                    self.pending.clear();
                    completions += 1;
                    self.skipping_line = true;
                }
                None => {
                    let keep = partial_token_suffix(&self.pending, &self.token)
                        .max(incomplete_utf8_suffix(&self.pending));
                    let split = self.pending.len() - keep;
                    released.extend_from_slice(&self.pending[..split]);
                    self.pending.drain(..split);
                    break;
                }
            }
        }

        ScanOutput {
            text: String::from_utf8_lossy(&released).into_owned(),
            completions,
        }
    }

    /// Release everything still held back, at end of stream.
    pub fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        self.skipping_line = false;
        String::from_utf8_lossy(&rest).into_owned()
    }
}

/// Runs the read loop for one channel.
pub struct OutputPump<R> {
    reader: R,
    scanner: SentinelScanner,
    signal: CompletionSignal,
    sink: Arc<dyn DiagnosticSink>,
    error_markers: Vec<String>,
}

impl<R: Read + Send + 'static> OutputPump<R> {
    /// Create a pump over a reader.
    pub fn new(
        reader: R,
        token: &str,
        error_markers: Vec<String>,
        signal: CompletionSignal,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            reader,
            scanner: SentinelScanner::new(token),
            signal,
            sink,
            error_markers,
        }
    }

    /// Start the pump on its own thread.
    pub fn start(self) -> Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("kiln-output-pump".to_string())
            .spawn(move || self.run())
            .map_err(|e| Error::Channel(format!("failed to start output pump thread: {}", e)))
    }

    /// Read until the pipe closes or a read fails.
    pub fn run(mut self) {
        let mut buffer = [0u8; READ_CHUNK];
        loop {
            match self.reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => {
                    let output = self.scanner.feed(&buffer[..n]);
                    self.forward(&output.text);
                    // Notice first, so a caller that sees the signal has seen the notice.
                    for _ in 0..output.completions {
                        self.sink.info("[kiln] Complete\n");
                        self.signal.set();
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                // The shell closing its end is the normal way out.
                Err(e) if e.kind() == ErrorKind::BrokenPipe => break,
                Err(e) => {
                    self.sink.error(&format!(
                        "[kiln] Redirect of compile output failed on read: {}\n",
                        e
                    ));
                    break;
                }
            }
        }

        let rest = self.scanner.finish();
        self.forward(&rest);
        tracing::debug!("output pump finished");
    }

    fn forward(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        let severity = classify(text, &self.error_markers);
        self.sink.log(severity, text);
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Length of the longest proper prefix of `token` that `bytes` ends with.
fn partial_token_suffix(bytes: &[u8], token: &[u8]) -> usize {
    let max = token.len().saturating_sub(1).min(bytes.len());
    (1..=max)
        .rev()
        .find(|&len| bytes.ends_with(&token[..len]))
        .unwrap_or(0)
}

/// Length of a truncated UTF-8 sequence at the end of `bytes`.
fn incomplete_utf8_suffix(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(4) {
        let byte = bytes[bytes.len() - back];
        if byte & 0xC0 != 0x80 {
            let width = match byte {
                0xC0..=0xDF => 2,
                0xE0..=0xEF => 3,
                0xF0..=0xF7 => 4,
                _ => 1,
            };
            return if width > back { back } else { 0 };
        }
    }
    0
}

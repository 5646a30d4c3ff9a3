//! Out-of-process compilation for hot-reloadable modules.
//!
//! This module provides:
//! - Compile options and requests (what to build, with which flags)
//! - Invocation building (options + request → one shell command line)
//! - The child process channel (long-lived shell with a merged output pipe)
//! - The output pump (completion detection and diagnostic classification)
//! - The compiler driver (the façade callers talk to)
//!
//! # Architecture
//!
//! ```text
//! CompilerDriver::run_compile
//!     │
//!     ├── Invocation ──► "cd <dir>\n<toolchain> <flags> -o <module> <sources> <libs>"
//!     │
//!     └── ChildProcessChannel (sh / cmd)
//!             │   stdin  ◄── command line + "echo <token>"
//!             │
//!             └── stdout+stderr ──► OutputPump ──► DiagnosticSink
//!                                        │
//!                                        └── CompletionSignal ◄── CompilerDriver::is_complete
//! ```

mod channel;
mod driver;
mod invocation;
mod options;
mod pump;
mod sink;
mod toolchain;

pub use driver::{CompileSessionState, CompilerDriver, DriverConfig};
pub use invocation::{Invocation, ensure_intermediate_dir};
pub use options::{CompileOptions, CompileRequest, OptimizationLevel};
pub use pump::{
    CompletionSignal, DEFAULT_COMPLETION_TOKEN, OutputPump, ScanOutput, SentinelScanner, classify,
    default_error_markers,
};
pub use sink::{Diagnostic, DiagnosticSink, RecordingSink, Severity, TracingSink};
pub use toolchain::{
    OBJECT_FILE_EXTENSION, ShellCommand, default_toolchain, dylib_extension, dylib_prefix,
    find_toolchain,
};

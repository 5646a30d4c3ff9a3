//! Error types for kiln-core.

use thiserror::Error;

/// Result type for kiln-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in kiln-core.
#[derive(Debug, Error)]
pub enum Error {
    /// The optimization level was left at `Default` and never resolved.
    #[error("optimization level must be resolved before invoking the toolchain")]
    UnresolvedOptimization,

    /// A compile was requested while the previous one is still running.
    #[error("a compile is already in progress")]
    CompileInProgress,

    /// Failed to set up or talk to the compiler shell process.
    #[error("compiler channel error: {0}")]
    Channel(String),

    /// Invalid configuration file.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

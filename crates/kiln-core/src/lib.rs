//! Core engine for Kiln hot-reload compilation.
//!
//! This crate provides:
//! - Out-of-process compilation driver (shell channel, output pump, completion detection)
//! - Command-line assembly for Unix-style native toolchains
//! - Diagnostic sinks for compiler output
//! - Compile-time dependency tracking tables for hot-reloadable types
//! - Build directory layout

pub mod compile;
pub mod error;
pub mod paths;
pub mod tracking;

pub use compile::{
    CompileOptions, CompileRequest, CompileSessionState, CompilerDriver, Diagnostic,
    DiagnosticSink, DriverConfig, OptimizationLevel, RecordingSink, Severity, TracingSink,
};
pub use error::{Error, Result};
pub use paths::BuildDirs;
pub use tracking::{
    DependencySet, RuntimeTracking, SourceDependency, Tracked, TrackedEntity, TrackingEntry,
    TrackingTable, tracked_entities,
};

//! Kiln: out-of-process compilation of hot-reloadable native modules.
//!
//! Kiln provides:
//! - **Asynchronous compiles**: a long-lived shell runs the toolchain while
//!   the host keeps running, and completion is polled
//! - **Diagnostics**: toolchain output is classified and forwarded in order
//! - **Dependency tracking**: `#[kiln::tracked]` declares the sources,
//!   libraries and includes a type needs, at zero runtime cost
//!
//! The stable user-facing API lives here. The engine itself is in
//! `kiln-core`.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kiln::prelude::*;
//!
//! #[kiln::tracked(source = "physics.cpp", link_library = "-lm")]
//! pub struct Physics;
//!
//! let dirs = BuildDirs::from_project_dir(std::path::Path::new("."));
//! dirs.create()?;
//!
//! let options = CompileOptions {
//!     intermediate_dir: Some(dirs.intermediate_dir.clone()),
//!     ..CompileOptions::development()
//! };
//! let request = CompileRequest::new(Vec::<std::path::PathBuf>::new(), dirs.module_path("physics"))
//!     .with_dependencies(&DependencySet::collect());
//!
//! let mut driver = CompilerDriver::new(Arc::new(TracingSink), DriverConfig::default());
//! driver.run_compile(&options, &request)?;
//! while !driver.is_complete() {
//!     std::thread::sleep(std::time::Duration::from_millis(50));
//! }
//! # Ok::<(), kiln::Error>(())
//! ```

pub use kiln_macros::tracked;

pub use kiln_core::compile;
pub use kiln_core::tracking;
pub use kiln_core::{
    BuildDirs, CompileOptions, CompileRequest, CompileSessionState, CompilerDriver, Diagnostic,
    DiagnosticSink, DriverConfig, Error, OptimizationLevel, RecordingSink, Result, Severity,
    TracingSink,
};
pub use kiln_core::{
    DependencySet, RuntimeTracking, SourceDependency, Tracked, TrackedEntity, TrackingEntry,
    TrackingTable, tracked_entities,
};

pub mod prelude {
    //! Common imports for hosts.
    //!
    //! ```rust,ignore
    //! use kiln::prelude::*;
    //! ```

    pub use crate::tracked;
    pub use crate::{
        BuildDirs, CompileOptions, CompileRequest, CompilerDriver, DependencySet,
        DiagnosticSink, DriverConfig, OptimizationLevel, RuntimeTracking, Tracked, TracingSink,
    };
}

#[doc(hidden)]
pub mod __private {
    //! Used by `#[kiln::tracked]` expansions. Not public API.

    pub use inventory;
}

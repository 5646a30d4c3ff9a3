//! Compile options and requests.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tracking::DependencySet;

/// Optimization tier for a compile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationLevel {
    /// Not chosen yet. Must be resolved before a compile is issued.
    #[default]
    Default,
    /// No optimization, best for debugging reloaded code.
    Debug,
    /// Optimize for size.
    Size,
}

impl OptimizationLevel {
    /// Resolve `Default` to a concrete tier based on how the host was built.
    ///
    /// Debug builds of the host compile modules without optimization,
    /// release builds compile them size-optimized. Concrete tiers are
    /// returned unchanged.
    pub fn resolve(self) -> Self {
        match self {
            Self::Default if cfg!(debug_assertions) => Self::Debug,
            Self::Default => Self::Size,
            other => other,
        }
    }

    /// The toolchain flag for this tier.
    pub fn flag(self) -> Result<&'static str> {
        match self {
            Self::Debug => Ok("-O0"),
            Self::Size => Ok("-Os"),
            Self::Default => Err(Error::UnresolvedOptimization),
        }
    }
}

/// Toolchain configuration shared by every compile request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Toolchain executable. `None` selects the built-in default.
    pub toolchain: Option<PathBuf>,

    /// Include directories, in search order.
    pub include_dirs: Vec<PathBuf>,

    /// Library and framework directories, in search order.
    pub library_dirs: Vec<PathBuf>,

    /// Extra compile flags, passed through verbatim.
    pub compile_flags: String,

    /// Extra link flags, passed to the linker through `-Wl,`.
    pub link_flags: String,

    /// Optimization tier
    pub optimization: OptimizationLevel,

    /// Directory for intermediate artifacts (also the toolchain's working directory).
    pub intermediate_dir: Option<PathBuf>,
}

impl CompileOptions {
    /// Options for unoptimized development builds.
    pub fn development() -> Self {
        Self {
            optimization: OptimizationLevel::Debug,
            ..Default::default()
        }
    }

    /// Load options from a JSON file.
    ///
    /// Missing fields take their default values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save options to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(e.to_string()))?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// One request to compile a set of sources into a loadable module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileRequest {
    /// Source files, compiled in order.
    pub sources: Vec<PathBuf>,

    /// Libraries to link, appended unquoted (e.g. `-lm` or `libfoo.a`).
    pub link_libraries: Vec<String>,

    /// Output module path.
    pub module: PathBuf,
}

impl CompileRequest {
    /// Create a request for the given sources and output module.
    pub fn new<I, P>(sources: I, module: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            sources: sources.into_iter().map(Into::into).collect(),
            link_libraries: Vec::new(),
            module: module.into(),
        }
    }

    /// Add a library to link.
    pub fn link(mut self, library: impl Into<String>) -> Self {
        self.link_libraries.push(library.into());
        self
    }

    /// Append the sources and link libraries declared by tracked types.
    ///
    /// Entries already present in the request are not repeated.
    pub fn with_dependencies(mut self, deps: &DependencySet) -> Self {
        for source in &deps.sources {
            if !self.sources.contains(source) {
                self.sources.push(source.clone());
            }
        }
        for library in &deps.link_libraries {
            if !self.link_libraries.contains(library) {
                self.link_libraries.push(library.clone());
            }
        }
        self
    }
}

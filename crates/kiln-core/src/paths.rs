//! Build directory management.
//!
//! Provides a consistent directory layout for compiled modules, so the CLI
//! and embedding hosts put artifacts in the same places.

use std::fs;
use std::path::{Path, PathBuf};

use crate::compile::{dylib_extension, dylib_prefix};
use crate::error::Result;

/// Directory layout for a Kiln project.
///
/// Everything lives under a `.kiln` directory next to the sources:
///
/// ```text
/// physics.cpp
/// .kiln/
/// ├── intermediate/  # Toolchain working directory and temporaries
/// └── modules/       # Compiled modules
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDirs {
    /// The `.kiln` directory itself.
    pub kiln_dir: PathBuf,

    /// Working directory for the toolchain.
    pub intermediate_dir: PathBuf,

    /// Output directory for compiled modules.
    pub modules_dir: PathBuf,
}

impl BuildDirs {
    /// Layout rooted at `project_dir`. Nothing is created on disk.
    pub fn from_project_dir(project_dir: &Path) -> Self {
        let kiln_dir = project_dir.join(".kiln");
        Self {
            intermediate_dir: kiln_dir.join("intermediate"),
            modules_dir: kiln_dir.join("modules"),
            kiln_dir,
        }
    }

    /// Layout for the directory containing `source`.
    pub fn from_source_path(source: &Path) -> Self {
        let dir = source
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        Self::from_project_dir(dir)
    }

    /// Create all directories if they don't exist.
    pub fn create(&self) -> Result<()> {
        fs::create_dir_all(&self.intermediate_dir)?;
        fs::create_dir_all(&self.modules_dir)?;
        Ok(())
    }

    /// Path of the module named `name` on this platform
    /// (e.g. `libphysics.so`, `libphysics.dylib` or `physics.dll`).
    pub fn module_path(&self, name: &str) -> PathBuf {
        self.modules_dir
            .join(format!("{}{}.{}", dylib_prefix(), name, dylib_extension()))
    }

    /// Remove all build artifacts and recreate the layout.
    pub fn clean(&self) -> Result<()> {
        if self.kiln_dir.exists() {
            fs::remove_dir_all(&self.kiln_dir)?;
        }
        self.create()
    }
}

//! Compile-time dependency tracking for hot-reloadable types.
//!
//! Every tracked type carries a fixed table of the sources, link libraries
//! and include files it depends on. Tables are built in `const`
//! initializers (usually by `#[kiln::tracked]`), so registration costs
//! nothing at runtime and lookup is one dynamic call plus an index.
//!
//! Tracked types are also collected at link time, so a host can ask for the
//! combined dependencies of everything linked into it (see
//! [`DependencySet::collect`]).

mod registry;

use std::path::{Path, PathBuf};

pub use registry::{DependencySet, TrackedEntity, tracked_entities};

/// A source file a tracked type depends on.
///
/// The resolved path is `parent(relative_to) / filename`, with the
/// filename's extension replaced by `extension` when one is given. A
/// missing `filename` means there is no dependency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SourceDependency {
    /// File name, absolute or relative.
    pub filename: Option<&'static str>,
    /// Extension override, with or without the leading dot.
    pub extension: Option<&'static str>,
    /// Path whose directory `filename` is relative to, typically `file!()`.
    pub relative_to: Option<&'static str>,
}

impl SourceDependency {
    /// No dependency.
    pub const NONE: Self = Self {
        filename: None,
        extension: None,
        relative_to: None,
    };

    /// Dependency on `filename`.
    pub const fn file(filename: &'static str) -> Self {
        Self {
            filename: Some(filename),
            extension: None,
            relative_to: None,
        }
    }

    /// Replace the file's extension when resolving.
    pub const fn with_extension(self, extension: &'static str) -> Self {
        Self {
            extension: Some(extension),
            ..self
        }
    }

    /// Resolve relative to the directory containing `path`.
    pub const fn relative_to(self, path: &'static str) -> Self {
        Self {
            relative_to: Some(path),
            ..self
        }
    }

    /// Whether this names no dependency.
    pub const fn is_none(&self) -> bool {
        self.filename.is_none()
    }

    /// The full path of the dependency, or `None` if there is none.
    ///
    /// Paths based on `file!()` come out relative to the directory the
    /// declaring crate was compiled from, not the current directory.
    pub fn resolve(&self) -> Option<PathBuf> {
        let filename = Path::new(self.filename?);

        let file = match self.extension {
            Some(ext) => filename.with_extension(ext.trim_start_matches('.')),
            None => filename.to_path_buf(),
        };

        let base = self
            .relative_to
            .and_then(|path| Path::new(path).parent())
            .unwrap_or(Path::new(""));

        Some(base.join(file))
    }
}

/// One row of a tracking table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TrackingEntry {
    pub source: SourceDependency,
    /// Library to link, passed to the toolchain as-is.
    pub link_library: Option<&'static str>,
    /// Header whose changes should trigger a recompile.
    pub include_file: Option<&'static str>,
}

impl TrackingEntry {
    /// The all-absent entry returned for unregistered indices.
    pub const NONE: Self = Self {
        source: SourceDependency::NONE,
        link_library: None,
        include_file: None,
    };

    pub const fn source(source: SourceDependency) -> Self {
        Self {
            source,
            ..Self::NONE
        }
    }

    pub const fn link_library(library: &'static str) -> Self {
        Self {
            link_library: Some(library),
            ..Self::NONE
        }
    }

    pub const fn include_file(path: &'static str) -> Self {
        Self {
            include_file: Some(path),
            ..Self::NONE
        }
    }

    /// Whether every field is absent.
    pub const fn is_none(&self) -> bool {
        self.source.is_none() && self.link_library.is_none() && self.include_file.is_none()
    }
}

/// Dependency lookup for one tracked type.
///
/// Lookup never fails and never allocates. Callers iterate `0..max_num()`
/// and skip absent fields; an index past the end yields
/// [`TrackingEntry::NONE`].
pub trait RuntimeTracking: Send + Sync {
    /// Number of entries declared for this type.
    fn max_num(&self) -> usize;

    /// The entry at `index`.
    fn tracking_info(&self, index: usize) -> TrackingEntry;
}

impl dyn RuntimeTracking + '_ {
    /// Iterate every entry in index order.
    pub fn entries(&self) -> impl Iterator<Item = TrackingEntry> + '_ {
        (0..self.max_num()).map(move |index| self.tracking_info(index))
    }
}

/// A fixed tracking table built in a `const` initializer.
///
/// ```
/// use kiln_core::{RuntimeTracking, SourceDependency, TrackingEntry, TrackingTable};
///
/// const TABLE: TrackingTable = TrackingTable::new(&[
///     TrackingEntry::source(SourceDependency::file("physics.cpp")),
///     TrackingEntry::link_library("-lm"),
/// ]);
///
/// assert_eq!(TABLE.max_num(), 2);
/// assert_eq!(TABLE.tracking_info(1).link_library, Some("-lm"));
/// assert!(TABLE.tracking_info(7).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingTable {
    entries: &'static [TrackingEntry],
}

impl TrackingTable {
    /// A table with no entries.
    pub const EMPTY: Self = Self::new(&[]);

    pub const fn new(entries: &'static [TrackingEntry]) -> Self {
        Self { entries }
    }

    /// The entries, in index order.
    pub const fn as_slice(&self) -> &'static [TrackingEntry] {
        self.entries
    }
}

impl RuntimeTracking for TrackingTable {
    fn max_num(&self) -> usize {
        self.entries.len()
    }

    fn tracking_info(&self, index: usize) -> TrackingEntry {
        self.entries.get(index).copied().unwrap_or(TrackingEntry::NONE)
    }
}

/// A type with a compile-time dependency table.
///
/// Normally implemented by `#[kiln::tracked(...)]`. Each type has its own
/// table, so types declared in separate modules or crates never share
/// indices.
pub trait Tracked {
    /// The type's dependency table.
    const TRACKING: TrackingTable;

    /// The table as a lookup object.
    fn tracking() -> &'static dyn RuntimeTracking;
}

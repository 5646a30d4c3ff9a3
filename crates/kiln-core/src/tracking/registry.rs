//! Link-time registry of tracked types.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;

use super::RuntimeTracking;

/// A tracked type, as submitted to the link-time registry.
#[derive(Clone, Copy)]
pub struct TrackedEntity {
    /// Type name, as written at the declaration.
    pub name: &'static str,
    /// Lookup for the type's tracking table.
    pub tracking: fn() -> &'static dyn RuntimeTracking,
}

impl TrackedEntity {
    pub const fn new(name: &'static str, tracking: fn() -> &'static dyn RuntimeTracking) -> Self {
        Self { name, tracking }
    }

    /// The type's tracking table.
    pub fn tracking(&self) -> &'static dyn RuntimeTracking {
        (self.tracking)()
    }
}

impl std::fmt::Debug for TrackedEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedEntity")
            .field("name", &self.name)
            .field("max_num", &self.tracking().max_num())
            .finish()
    }
}

inventory::collect!(TrackedEntity);

/// Every tracked type linked into this binary.
///
/// Order is unspecified.
pub fn tracked_entities() -> impl Iterator<Item = &'static TrackedEntity> {
    inventory::iter::<TrackedEntity>.into_iter()
}

/// Combined dependencies of a set of tracked types.
///
/// Each list keeps the order of first appearance and holds no duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySet {
    /// Resolved source files.
    pub sources: Vec<PathBuf>,
    /// Libraries to link.
    pub link_libraries: Vec<String>,
    /// Include files to watch.
    pub include_files: Vec<PathBuf>,
}

impl DependencySet {
    /// Dependencies of every tracked type linked into this binary.
    ///
    /// Entities are visited in name order so the result is stable.
    pub fn collect() -> Self {
        let mut entities: Vec<_> = tracked_entities().collect();
        entities.sort_by_key(|entity| entity.name);

        let mut set = Self::default();
        for entity in entities {
            set.add(entity.tracking());
        }
        set
    }

    /// Dependencies of one tracking table.
    pub fn from_tracking(tracking: &dyn RuntimeTracking) -> Self {
        let mut set = Self::default();
        set.add(tracking);
        set
    }

    /// Add the entries of `tracking`, skipping absent fields and duplicates.
    pub fn add(&mut self, tracking: &dyn RuntimeTracking) {
        for entry in tracking.entries() {
            if let Some(source) = entry.source.resolve() {
                push_unique(&mut self.sources, source);
            }
            if let Some(library) = entry.link_library {
                push_unique(&mut self.link_libraries, library.to_string());
            }
            if let Some(include) = entry.include_file {
                push_unique(&mut self.include_files, PathBuf::from(include));
            }
        }
    }

    /// Resolve relative file paths against `root`.
    ///
    /// Paths derived from `file!()` are relative to the directory the
    /// declaring crate was compiled from; pass that directory here.
    /// Absolute paths and link libraries are left alone.
    pub fn rooted_at(self, root: &Path) -> Self {
        let root_all = |paths: Vec<PathBuf>| {
            let mut rooted = Vec::with_capacity(paths.len());
            for path in paths {
                push_unique(&mut rooted, root.join(path));
            }
            rooted
        };
        Self {
            sources: root_all(self.sources),
            link_libraries: self.link_libraries,
            include_files: root_all(self.include_files),
        }
    }

    /// Whether no dependencies were found.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.link_libraries.is_empty() && self.include_files.is_empty()
    }

    /// Every file a watcher should observe: sources, then include files.
    pub fn watched_files(&self) -> Vec<PathBuf> {
        let mut seen = FxHashSet::default();
        self.sources
            .iter()
            .chain(&self.include_files)
            .filter(|path| seen.insert(*path))
            .cloned()
            .collect()
    }
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, item: T) {
    if !list.contains(&item) {
        list.push(item);
    }
}

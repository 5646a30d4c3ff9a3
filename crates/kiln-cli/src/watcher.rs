//! File watcher for detecting source changes.
//!
//! Watches the directories holding a set of source files and reports
//! debounced changes to those files only.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use notify_debouncer_mini::{DebounceEventResult, new_debouncer, notify::RecursiveMode};
use rustc_hash::FxHashSet;
use tokio::sync::mpsc;

/// Debounce window for editor save bursts.
const DEBOUNCE: Duration = Duration::from_millis(200);

/// Source change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// File was written or recreated.
    Modified(PathBuf),
    /// File was removed.
    Removed(PathBuf),
}

impl SourceEvent {
    pub fn path(&self) -> &Path {
        match self {
            Self::Modified(path) | Self::Removed(path) => path,
        }
    }
}

/// Watches a fixed set of source files.
pub struct SourceWatcher {
    /// Debouncer handle (kept alive to maintain watcher).
    _debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
    /// Receiver for source events.
    rx: mpsc::UnboundedReceiver<SourceEvent>,
}

impl SourceWatcher {
    /// Start watching `files`. Each file must exist.
    pub fn new(files: &[PathBuf]) -> anyhow::Result<Self> {
        let mut targets = FxHashSet::default();
        let mut dirs = FxHashSet::default();
        for file in files {
            let file = file
                .canonicalize()
                .with_context(|| format!("Source not found: {}", file.display()))?;
            let dir = file.parent().unwrap_or(Path::new("/")).to_path_buf();
            dirs.insert(dir);
            targets.insert(file);
        }

        let (tx, rx) = mpsc::unbounded_channel();

        let mut debouncer = new_debouncer(DEBOUNCE, move |result: DebounceEventResult| {
            let events = match result {
                Ok(events) => events,
                Err(e) => {
                    tracing::warn!("file watch error: {}", e);
                    return;
                }
            };

            for event in events {
                if !targets.contains(&event.path) {
                    continue;
                }

                let source_event = if event.path.exists() {
                    SourceEvent::Modified(event.path.clone())
                } else {
                    SourceEvent::Removed(event.path.clone())
                };

                let _ = tx.send(source_event);
            }
        })
        .context("Failed to create file watcher")?;

        for dir in &dirs {
            debouncer
                .watcher()
                .watch(dir, RecursiveMode::NonRecursive)
                .with_context(|| format!("Failed to watch {}", dir.display()))?;
        }

        Ok(Self {
            _debouncer: debouncer,
            rx,
        })
    }

    /// Receive the next source event.
    pub async fn recv(&mut self) -> Option<SourceEvent> {
        self.rx.recv().await
    }

    /// Discard events that are already queued, returning how many there were.
    pub fn drain(&mut self) -> usize {
        let mut count = 0;
        while self.rx.try_recv().is_ok() {
            count += 1;
        }
        count
    }
}

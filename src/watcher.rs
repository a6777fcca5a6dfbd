//! Filesystem change notifications for the document root.
//!
//! Wraps `notify`'s recommended watcher. Raw events are reduced to
//! [`PathEvent`]s for document paths only and pushed into a bounded
//! tokio channel. The notify thread blocks when the channel is full.

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use crate::source_fs::DocumentFilter;

/// One unit of work for the sync worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathEvent {
    Add(PathBuf),
    Change(PathBuf),
    Unlink(PathBuf),
    /// The platform dropped events; only a full pass is trustworthy.
    Rescan,
}

/// Keeps the underlying watcher alive. Dropping it stops notifications
/// and closes the sending side of the queue.
pub struct ChangeWatcher {
    _watcher: RecommendedWatcher,
}

impl ChangeWatcher {
    pub fn start(
        root: &Path,
        recursive: bool,
        filter: DocumentFilter,
        events: mpsc::Sender<PathEvent>,
    ) -> notify::Result<Self> {
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    for path_event in convert_event(&event, &filter) {
                        tracing::trace!(?path_event, "queueing change");
                        // Runs on the notify thread, outside the tokio runtime.
                        if events.blocking_send(path_event).is_err() {
                            tracing::warn!("change queue closed; dropping event");
                            break;
                        }
                    }
                }
                Err(e) => tracing::error!(error = %e, "watch error"),
            }
        })?;

        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(root, mode)?;
        tracing::info!(root = %root.display(), recursive, "watching for changes");

        Ok(Self { _watcher: watcher })
    }
}

/// Reduce one raw notify event to zero or more document events.
pub fn convert_event(event: &Event, filter: &DocumentFilter) -> Vec<PathEvent> {
    if event.need_rescan() {
        return vec![PathEvent::Rescan];
    }

    let docs = |paths: &[PathBuf], make: fn(PathBuf) -> PathEvent| -> Vec<PathEvent> {
        paths
            .iter()
            .filter(|p| filter.accepts(p))
            .map(|p| make(p.clone()))
            .collect()
    };

    match &event.kind {
        EventKind::Create(_) => docs(&event.paths, PathEvent::Add),
        EventKind::Remove(_) => docs(&event.paths, PathEvent::Unlink),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(ModifyKind::Name(mode)) => match (mode, event.paths.as_slice()) {
            (RenameMode::Both, [from, to]) => {
                let mut out = docs(std::slice::from_ref(from), PathEvent::Unlink);
                out.extend(docs(std::slice::from_ref(to), PathEvent::Add));
                out
            }
            (RenameMode::From, paths) => docs(paths, PathEvent::Unlink),
            (RenameMode::To, paths) => docs(paths, PathEvent::Add),
            // Direction unknown; the filesystem decides.
            (_, paths) => paths
                .iter()
                .filter(|p| filter.accepts(p))
                .map(|p| {
                    if p.exists() {
                        PathEvent::Add(p.clone())
                    } else {
                        PathEvent::Unlink(p.clone())
                    }
                })
                .collect(),
        },
        EventKind::Modify(_) => docs(&event.paths, PathEvent::Change),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

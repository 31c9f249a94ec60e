//! The file watcher as a small named interface (§1 "the file watcher
//! library [is an] external collaborator... consumed through a small,
//! named interface"), matching how the teacher keeps `ignore`/`jwalk`
//! behind its own directory-walk helpers rather than calling them
//! everywhere directly. [`NotifyWatcher`] is the default implementation,
//! backed by the `notify` crate already reserved in the workspace
//! manifest for this purpose.

use std::path::{Path, PathBuf};

use bundler_diag::Diagnostic;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Created,
    Modified,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub kind: WatchEventKind,
}

/// Anything that can watch a directory tree and hand back file-change
/// events one at a time. `watch` is the setup step (may be called once);
/// `next_event` blocks until an event is available or the watcher is torn
/// down, mirroring how the dev server's dispatch loop consumes it.
pub trait Watcher: Send {
    fn watch(&mut self, root: &Path) -> Result<(), Diagnostic>;
    fn next_event(&mut self) -> Option<WatchEvent>;
}

fn to_watch_events(event: Event) -> Vec<WatchEvent> {
    let kind = match event.kind {
        EventKind::Create(_) => WatchEventKind::Created,
        EventKind::Modify(_) => WatchEventKind::Modified,
        EventKind::Remove(_) => WatchEventKind::Removed,
        _ => return Vec::new(),
    };
    event.paths.into_iter().map(|path| WatchEvent { path, kind }).collect()
}

/// The default, `notify`-backed [`Watcher`]. Holds the underlying
/// `RecommendedWatcher` alive for as long as events are wanted — dropping
/// it stops delivery, same as the `notify` crate's own contract.
#[derive(Default)]
pub struct NotifyWatcher {
    inner: Option<RecommendedWatcher>,
    receiver: Option<crossbeam_channel::Receiver<WatchEvent>>,
}

impl NotifyWatcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Watcher for NotifyWatcher {
    fn watch(&mut self, root: &Path) -> Result<(), Diagnostic> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            if let Ok(event) = result {
                for watch_event in to_watch_events(event) {
                    let _ = tx.send(watch_event);
                }
            }
        })
        .map_err(|err| Diagnostic::IoUnreadable {
            path: root.to_path_buf(),
            message: err.to_string(),
        })?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|err| Diagnostic::IoUnreadable {
                path: root.to_path_buf(),
                message: err.to_string(),
            })?;

        self.inner = Some(watcher);
        self.receiver = Some(rx);
        Ok(())
    }

    fn next_event(&mut self) -> Option<WatchEvent> {
        self.receiver.as_ref()?.recv().ok()
    }
}

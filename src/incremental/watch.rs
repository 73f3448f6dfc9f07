//! File-system watching driver (spec.md §5 "Concurrency & resource
//! model"; SPEC_FULL.md §5: "`incremental::watch::FileWatchDriver` owns a
//! `notify::RecommendedWatcher` on its own thread; the single write lock
//! over 'Module_name_to_file_path' is `std::sync::RwLock<HashMap<String,
//! PathBuf>>` inside `incremental::DatabaseHandle`").
//!
//! The driver only detects and names the changed module; it is the
//! caller's job (the JIT driver, or a CLI's recompile loop) to decide
//! what to do about it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use log::{error, warn};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// Shared, lock-protected map from module name to the source file that
/// produced it. A single `RwLock` rather than one per module, per
/// SPEC_FULL.md §5 — every watch callback and every `watch_module` call
/// goes through the same lock.
pub type DatabaseHandle = Arc<RwLock<HashMap<String, PathBuf>>>;

pub fn new_database_handle() -> DatabaseHandle {
    Arc::new(RwLock::new(HashMap::new()))
}

pub struct FileWatchDriver {
    watcher: RecommendedWatcher,
}

impl FileWatchDriver {
    /// Starts watching every path already registered in `database`,
    /// invoking `on_change(module_name, path)` from the watcher's own
    /// background thread whenever one of those paths is modified.
    pub fn start(
        database: DatabaseHandle,
        on_change: impl Fn(String, PathBuf) + Send + 'static,
    ) -> notify::Result<Self> {
        let callback_database = Arc::clone(&database);
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
            let event = match event {
                Ok(event) => event,
                Err(error) => {
                    error!("file watcher error: {error}");
                    return;
                }
            };
            if !matches!(event.kind, EventKind::Modify(_)) {
                return;
            }
            let Ok(paths) = callback_database.read() else {
                warn!("file watcher database lock poisoned, dropping change event");
                return;
            };
            for changed_path in &event.paths {
                if let Some((module_name, _)) = paths.iter().find(|(_, path)| *path == changed_path) {
                    // `path: &PathBuf`, `changed_path: &PathBuf`; dereferenced once each for PartialEq<PathBuf>.
                    on_change(module_name.clone(), changed_path.clone());
                }
            }
        })?;

        let paths: Vec<PathBuf> = database.read().expect("watch database lock poisoned").values().cloned().collect();
        for path in paths {
            watcher.watch(&path, RecursiveMode::NonRecursive)?;
        }

        Ok(FileWatchDriver { watcher })
    }

    /// Registers a new module/path pair and starts watching it. Call this
    /// whenever a module is loaded after the driver has already started
    /// (spec.md §4.9 "watch mode... a new file appearing mid-session").
    pub fn watch_module(&mut self, database: &DatabaseHandle, module_name: String, path: PathBuf) -> notify::Result<()> {
        self.watcher.watch(&path, RecursiveMode::NonRecursive)?;
        database.write().expect("watch database lock poisoned").insert(module_name, path);
        Ok(())
    }

    pub fn unwatch_module(&mut self, database: &DatabaseHandle, module_name: &str) -> notify::Result<()> {
        let removed_path = database.write().expect("watch database lock poisoned").remove(module_name);
        if let Some(path) = removed_path {
            self.watcher.unwatch(&path)?;
        }
        Ok(())
    }
}

pub fn module_for_path(database: &DatabaseHandle, path: &Path) -> Option<String> {
    database
        .read()
        .expect("watch database lock poisoned")
        .iter()
        .find(|(_, p)| p.as_path() == path)
        .map(|(name, _)| name.clone())
}

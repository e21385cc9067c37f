//! Polling scanner over the monitored folders
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

pub struct FolderScanner {
    folders: Vec<PathBuf>,
    debounce: Duration,
    seen: HashMap<PathBuf, SystemTime>, // path -> modification time last handed out
}

impl FolderScanner {
    pub fn new(folders: Vec<PathBuf>, debounce: Duration) -> Self {
        Self {
            folders,
            debounce,
            seen: HashMap::new(),
        }
    }

    /// Files that are new or changed since the last poll and have been quiet
    /// for at least the debounce window. Files still being written are left
    /// for a later poll.
    pub fn poll(&mut self) -> Vec<PathBuf> {
        let now = SystemTime::now();
        let mut ready = vec![];

        for folder in &self.folders {
            let entries = match std::fs::read_dir(folder) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(folder = %folder.display(), error = %e, "cannot read monitored folder");
                    continue;
                }
            };

            for entry in entries.flatten() {
                let path = entry.path();
                let Ok(metadata) = entry.metadata() else {
                    continue;
                };
                if !metadata.is_file() {
                    continue;
                }
                let Ok(modified) = metadata.modified() else {
                    continue;
                };

                if self.seen.get(&path) == Some(&modified) {
                    continue;
                }
                let age = now.duration_since(modified).unwrap_or_default();
                if age < self.debounce {
                    debug!(path = %path.display(), "debounced event");
                    continue;
                }

                self.seen.insert(path.clone(), modified);
                ready.push(path);
            }
        }

        ready.sort();
        ready
    }
}

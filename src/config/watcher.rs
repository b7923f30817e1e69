// Copyright 2025 Eric Jingryd (tidynest@proton.me)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! File system watcher for live mapping file monitoring
//!
//! Uses OS-level file watching (Linux inotify) via the notify crate.
//! The parent directory is watched rather than the file, because atomic
//! writes replace the file by rename and a watch on the old inode would
//! go silent after the first save.

use crossbeam_channel::{unbounded, Receiver};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;

use crate::config::{ConfigError, MappingFile};
use crate::store::MappingStore;

/// Watches the mapping file for external modifications
pub struct MappingFileWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    file_name: OsString,
}

impl MappingFileWatcher {
    pub fn new(path: &Path) -> Result<Self, ConfigError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| ConfigError::InvalidPath(path.to_path_buf()))?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tx, rx) = unbounded();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )
        .map_err(|source| ConfigError::Watch {
            path: dir.clone(),
            source,
        })?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|source| ConfigError::Watch {
                path: dir.clone(),
                source,
            })?;

        Ok(MappingFileWatcher {
            _watcher: watcher,
            rx,
            file_name,
        })
    }

    /// Raw event stream, for callers that select over several channels.
    pub fn events(&self) -> &Receiver<notify::Result<Event>> {
        &self.rx
    }

    /// True if `event` created or modified the watched file.
    pub fn is_relevant(&self, event: &Event) -> bool {
        matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
            && event
                .paths
                .iter()
                .any(|p| p.file_name() == Some(self.file_name.as_os_str()))
    }

    /// Checks for file modification events (non-blocking)
    pub fn check_for_changes(&self) -> bool {
        let mut changed = false;
        while let Ok(event_result) = self.rx.try_recv() {
            if let Ok(event) = event_result {
                changed |= self.is_relevant(&event);
            }
        }
        changed
    }

    /// Blocks up to `timeout` for a relevant event, then drains the rest.
    pub fn wait_for_change(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(Ok(event)) if self.is_relevant(&event) => {
                    self.check_for_changes();
                    return true;
                }
                Ok(_) => continue,
                Err(_) => return false,
            }
        }
    }
}

/// Reloads `store` from `file`, returning the number of repaired records.
///
/// The reloaded table is not written back. On error the store keeps its
/// current table.
pub fn reload(file: &MappingFile, store: &MappingStore) -> Result<usize, ConfigError> {
    let mappings = file.load()?;
    let repaired = store.replace_all(mappings);

    info!(path = %file.path().display(), count = store.len(), "mappings reloaded");
    Ok(repaired)
}

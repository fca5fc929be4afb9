use crate::gather::TreeNode;
use crate::rules::presets::Preset;
use log;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Selected file paths, detached from any particular tree instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectionSnapshot {
    paths: BTreeSet<PathBuf>,
}

impl SelectionSnapshot {
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }
}

/// Running totals shown to the user while selecting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SelectionSummary {
    pub files: usize,
    pub total_bytes: u64,
}

/// Selection operations. All of them are meant to be called on the master
/// tree; a flat projection shares its flags with it.
impl TreeNode {
    /// Selects or deselects the file at `path`. Returns false when no file
    /// node has that path.
    pub fn set_file_selected(&self, path: &Path, selected: bool) -> bool {
        match self.files().find(|node| node.path() == path) {
            Some(node) => {
                node.set_selected(selected);
                true
            }
            None => {
                log::debug!("No file node for selection request: {}", path.display());
                false
            }
        }
    }

    /// Exclusive preset: every file is selected exactly when its name matches.
    /// Returns the number of selected files.
    pub fn select_by_preset(&self, preset: &Preset) -> usize {
        let mut count = 0;
        for node in self.files() {
            let matched = preset.matches(node.name());
            node.set_selected(matched);
            if matched {
                count += 1;
            }
        }
        log::debug!("Preset '{}' selected {} files.", preset.name(), count);
        count
    }

    pub fn clear_selection(&self) {
        for node in self.files() {
            node.set_selected(false);
        }
    }

    /// Selected file paths in pre-order, the order used for weaving.
    pub fn selected_paths(&self) -> Vec<PathBuf> {
        self.files()
            .filter(|node| node.is_selected())
            .map(|node| node.path().to_path_buf())
            .collect()
    }

    pub fn snapshot(&self) -> SelectionSnapshot {
        SelectionSnapshot::from_paths(self.selected_paths())
    }

    /// Re-selects files present in `snapshot`. Paths without a matching file
    /// node are dropped. Returns the number of restored files.
    pub fn restore(&self, snapshot: &SelectionSnapshot) -> usize {
        if snapshot.is_empty() {
            return 0;
        }
        let mut restored = 0;
        for node in self.files() {
            if snapshot.contains(node.path()) {
                node.set_selected(true);
                restored += 1;
            }
        }
        if restored < snapshot.len() {
            log::debug!(
                "Dropped {} stale selections after reload.",
                snapshot.len() - restored
            );
        }
        restored
    }

    /// Counts selected files and sums their sizes; unreadable sizes count as 0.
    pub fn selection_summary(&self) -> SelectionSummary {
        self.files()
            .filter(|node| node.is_selected())
            .fold(SelectionSummary::default(), |mut acc, node| {
                acc.files += 1;
                acc.total_bytes += fs::metadata(node.path()).map(|m| m.len()).unwrap_or(0);
                acc
            })
    }
}

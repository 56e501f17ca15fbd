// Commit - one undoable step, as whole-file before/after snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Contents of one project file before and after an edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSnapshot {
    /// Folder relative to the project root ("" for the root itself)
    pub folder: String,
    pub file: String,
    pub old_text: String,
    pub new_text: String,

    /// Undo deletes the file instead of restoring `old_text` when false
    pub existed_before: bool,
}

impl FileSnapshot {
    /// Path relative to the project root
    pub fn relative_path(&self) -> PathBuf {
        if self.folder.is_empty() {
            PathBuf::from(&self.file)
        } else {
            Path::new(&self.folder).join(&self.file)
        }
    }

    /// Whether the snapshot changed anything
    pub fn is_noop(&self) -> bool {
        self.existed_before && self.old_text == self.new_text
    }
}

/// A group of file snapshots undone and redone together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub snapshots: Vec<FileSnapshot>,
}

impl Commit {
    pub fn new(message: impl Into<String>, snapshots: Vec<FileSnapshot>) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now(),
            snapshots,
        }
    }

    /// Relative paths touched by this commit, in staging order
    pub fn files(&self) -> Vec<PathBuf> {
        self.snapshots.iter().map(|s| s.relative_path()).collect()
    }
}

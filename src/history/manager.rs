// HistoryLog - commit-based undo/redo over project files
//
// Every persisted edit goes through `stage`, which records the file's text
// before and after the write. `commit` groups the staged snapshots into one
// undoable step. Each numbered context keeps its own commit list and cursor.

use crate::error::{ProjectError, ProjectResult};
use crate::history::commit::{Commit, FileSnapshot};
use ron::{from_str as ron_from_str, to_string as ron_to_string};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Default maximum number of commits kept per context
pub const DEFAULT_MAX_HISTORY: usize = 100;

/// Context used unless another one is selected
pub const MAIN_CONTEXT: u32 = 0;

/// Commit list and cursor of one context
///
/// `undo_cursor` counts commits behind the tip: 0 means nothing is undone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryContext {
    pub commits: Vec<Commit>,
    pub undo_cursor: usize,
}

/// On-disk form of the history
#[derive(Debug, Serialize, Deserialize)]
struct Journal {
    current: u32,
    contexts: BTreeMap<u32, HistoryContext>,
}

/// Undo/redo log over the files of one project directory
#[derive(Debug)]
pub struct HistoryLog {
    root: PathBuf,
    contexts: BTreeMap<u32, HistoryContext>,
    current: u32,
    pending: Vec<FileSnapshot>,
    max_history: usize,

    /// Files written by the last undo or redo
    restored: Vec<PathBuf>,
}

fn write_file(path: &Path, text: &str) -> ProjectResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)?;
    Ok(())
}

fn remove_file(path: &Path) -> ProjectResult<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

impl HistoryLog {
    /// Create a history for the project rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_capacity(root, DEFAULT_MAX_HISTORY)
    }

    /// Create a history with a custom per-context commit limit
    pub fn with_capacity(root: impl Into<PathBuf>, max_history: usize) -> Self {
        Self {
            root: root.into(),
            contexts: BTreeMap::new(),
            current: MAIN_CONTEXT,
            pending: Vec::new(),
            max_history: max_history.max(1),
            restored: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, folder: &str, file: &str) -> PathBuf {
        if folder.is_empty() {
            self.root.join(file)
        } else {
            self.root.join(folder).join(file)
        }
    }

    /// Write `new_text` to `folder/file`, remembering what was there
    ///
    /// Staging the same file twice before a commit keeps the first
    /// before-image.
    pub fn stage(&mut self, folder: &str, file: &str, new_text: &str) -> ProjectResult<()> {
        let path = self.path_of(folder, file);

        if let Some(existing) = self
            .pending
            .iter_mut()
            .find(|s| s.folder == folder && s.file == file)
        {
            existing.new_text = new_text.to_string();
        } else {
            let (old_text, existed_before) = match fs::read_to_string(&path) {
                Ok(text) => (text, true),
                Err(e) if e.kind() == ErrorKind::NotFound => (String::new(), false),
                Err(e) => return Err(e.into()),
            };
            self.pending.push(FileSnapshot {
                folder: folder.to_string(),
                file: file.to_string(),
                old_text,
                new_text: new_text.to_string(),
                existed_before,
            });
        }

        write_file(&path, new_text)
    }

    /// Whether anything is staged and not yet committed
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Group staged snapshots into one commit on the current context
    ///
    /// Commits past the undo cursor are discarded first. Returns false when
    /// nothing changed.
    pub fn commit(&mut self, message: &str) -> bool {
        let snapshots: Vec<FileSnapshot> = std::mem::take(&mut self.pending)
            .into_iter()
            .filter(|s| !s.is_noop())
            .collect();
        if snapshots.is_empty() {
            return false;
        }

        let max_history = self.max_history;
        let context = self.contexts.entry(self.current).or_default();
        if context.undo_cursor > 0 {
            let keep = context.commits.len() - context.undo_cursor;
            context.commits.truncate(keep);
            context.undo_cursor = 0;
        }
        context.commits.push(Commit::new(message, snapshots));
        if context.commits.len() > max_history {
            let excess = context.commits.len() - max_history;
            context.commits.drain(..excess);
        }

        log::info!("History commit '{}' (context {})", message, self.current);
        true
    }

    fn check_no_pending(&self) -> ProjectResult<()> {
        if self.has_pending() {
            return Err(ProjectError::InvalidValue(
                "staged changes must be committed before undo or redo".to_string(),
            ));
        }
        Ok(())
    }

    /// Restore the files of the most recent commit not yet undone
    ///
    /// Returns false at the oldest commit.
    pub fn undo(&mut self) -> ProjectResult<bool> {
        self.check_no_pending()?;
        let root = self.root.clone();
        let Some(context) = self.contexts.get_mut(&self.current) else {
            return Ok(false);
        };
        if context.undo_cursor >= context.commits.len() {
            return Ok(false);
        }

        let index = context.commits.len() - 1 - context.undo_cursor;
        let commit = &context.commits[index];
        let mut restored = Vec::with_capacity(commit.snapshots.len());
        for snapshot in commit.snapshots.iter().rev() {
            let path = root.join(snapshot.relative_path());
            if snapshot.existed_before {
                write_file(&path, &snapshot.old_text)?;
            } else {
                remove_file(&path)?;
            }
            restored.push(snapshot.relative_path());
        }
        context.undo_cursor += 1;

        log::info!("Undo '{}'", commit.message);
        self.restored = restored;
        Ok(true)
    }

    /// Re-apply the most recently undone commit
    ///
    /// Returns false at the tip.
    pub fn redo(&mut self) -> ProjectResult<bool> {
        self.check_no_pending()?;
        let root = self.root.clone();
        let Some(context) = self.contexts.get_mut(&self.current) else {
            return Ok(false);
        };
        if context.undo_cursor == 0 {
            return Ok(false);
        }

        let index = context.commits.len() - context.undo_cursor;
        let commit = &context.commits[index];
        for snapshot in &commit.snapshots {
            write_file(&root.join(snapshot.relative_path()), &snapshot.new_text)?;
        }
        context.undo_cursor -= 1;

        log::info!("Redo '{}'", commit.message);
        self.restored = commit.files();
        Ok(true)
    }

    /// Files written by the last successful undo or redo
    pub fn restored_files(&self) -> &[PathBuf] {
        &self.restored
    }

    pub fn can_undo(&self) -> bool {
        self.contexts
            .get(&self.current)
            .is_some_and(|c| c.undo_cursor < c.commits.len())
    }

    pub fn can_redo(&self) -> bool {
        self.contexts
            .get(&self.current)
            .is_some_and(|c| c.undo_cursor > 0)
    }

    /// Message of the commit `undo` would restore
    pub fn undo_description(&self) -> Option<&str> {
        let context = self.contexts.get(&self.current)?;
        let index = context.commits.len().checked_sub(context.undo_cursor + 1)?;
        Some(context.commits[index].message.as_str())
    }

    pub fn redo_description(&self) -> Option<&str> {
        let context = self.contexts.get(&self.current)?;
        if context.undo_cursor == 0 {
            return None;
        }
        let index = context.commits.len() - context.undo_cursor;
        Some(context.commits[index].message.as_str())
    }

    /// Switch the context that commits, undo and redo apply to
    pub fn set_context(&mut self, id: u32) {
        self.current = id;
    }

    pub fn current_context(&self) -> u32 {
        self.current
    }

    pub fn context(&self, id: u32) -> Option<&HistoryContext> {
        self.contexts.get(&id)
    }

    /// Forget a context's commits; falls back to the main context if current
    pub fn discard_context(&mut self, id: u32) {
        self.contexts.remove(&id);
        if self.current == id {
            self.current = MAIN_CONTEXT;
        }
    }

    /// Write every context to a RON journal
    pub fn save_journal(&self, path: &Path) -> ProjectResult<()> {
        let journal = Journal {
            current: self.current,
            contexts: self.contexts.clone(),
        };
        let text = ron_to_string(&journal)
            .map_err(|e| ProjectError::Journal(format!("Failed to serialize history: {}", e)))?;
        write_file(path, &text)
    }

    /// Replace the in-memory contexts with a RON journal's contents
    pub fn load_journal(&mut self, path: &Path) -> ProjectResult<()> {
        let text = fs::read_to_string(path)?;
        let journal: Journal = ron_from_str(&text)
            .map_err(|e| ProjectError::Journal(format!("Failed to parse history: {}", e)))?;
        for (id, context) in &journal.contexts {
            if context.undo_cursor > context.commits.len() {
                return Err(ProjectError::Journal(format!(
                    "Context {} undo cursor {} is past its {} commit(s)",
                    id,
                    context.undo_cursor,
                    context.commits.len()
                )));
            }
        }
        self.contexts = journal.contexts;
        self.current = journal.current;
        self.pending.clear();
        Ok(())
    }
}

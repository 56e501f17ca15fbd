// Project options, stored as RON next to the project files

use crate::codec::FormatError;
use crate::error::{ProjectError, ProjectResult};
use crate::history::DEFAULT_MAX_HISTORY;
use crate::project::files::OPTIONS_FILE;
use crate::sequencer::TimeSignature;
use crate::sequencer::timeline::DEFAULT_BPM;
use ron::{from_str as ron_from_str, to_string as ron_to_string};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Options for creating and editing a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectOptions {
    /// Commits kept per history context
    pub max_history: usize,
    /// Tempo of the beat-0 marker in a new project
    pub default_bpm: f64,
    pub default_tsig: TimeSignature,
    /// Folder holding one file per Item
    pub items_folder: String,
    /// Folder holding one plugin chain file per track
    pub tracks_folder: String,
    /// Run `Timeline::fix_overlaps` before every timeline save
    pub fix_overlaps_on_save: bool,
}

impl Default for ProjectOptions {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_MAX_HISTORY,
            default_bpm: DEFAULT_BPM,
            default_tsig: TimeSignature::four_four(),
            items_folder: "items".to_string(),
            tracks_folder: "tracks".to_string(),
            fix_overlaps_on_save: true,
        }
    }
}

impl ProjectOptions {
    /// Load `project.ron` from a project root; defaults when it is missing
    pub fn load(root: &Path) -> ProjectResult<Self> {
        let text = match fs::read_to_string(root.join(OPTIONS_FILE)) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        let options: Self = ron_from_str(&text).map_err(|e| {
            ProjectError::format(
                OPTIONS_FILE,
                FormatError::file(format!("Failed to deserialize from RON: {}", e)),
            )
        })?;
        options
            .validate()
            .map_err(|e| ProjectError::format(OPTIONS_FILE, FormatError::file(e.to_string())))?;
        Ok(options)
    }

    /// Reject a default tempo or time signature no marker could carry
    pub fn validate(&self) -> ProjectResult<()> {
        if !self.default_bpm.is_finite() || self.default_bpm <= 0.0 {
            return Err(ProjectError::InvalidValue(format!(
                "default bpm must be positive, got {}",
                self.default_bpm
            )));
        }
        TimeSignature::new(self.default_tsig.numerator, self.default_tsig.denominator)?;
        Ok(())
    }

    pub fn save(&self, root: &Path) -> ProjectResult<()> {
        let text = ron_to_string(self).map_err(|e| {
            ProjectError::InvalidValue(format!("Failed to serialize to RON: {}", e))
        })?;
        fs::write(root.join(OPTIONS_FILE), text)?;
        Ok(())
    }
}

// Project directory layout and component file I/O

use crate::codec::TextCodec;
use crate::error::{ProjectError, ProjectResult};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Timeline (arrangement and markers)
pub const SEQUENCER_FILE: &str = "sequencer.txt";
pub const AUTOMATION_FILE: &str = "automation.txt";
pub const ROUTING_FILE: &str = "routing.txt";
pub const MIDI_ROUTING_FILE: &str = "midi_routing.txt";
/// Item name directory
pub const ITEMS_FILE: &str = "items.txt";
pub const TRACKS_FILE: &str = "tracks.txt";

/// Project options (RON)
pub const OPTIONS_FILE: &str = "project.ron";
/// Undo/redo journal (RON)
pub const HISTORY_FILE: &str = "history.ron";

/// Path of a file relative to the project root, as shown in errors
pub fn display_path(folder: &str, file: &str) -> String {
    if folder.is_empty() {
        file.to_string()
    } else {
        format!("{}/{}", folder, file)
    }
}

/// Read and decode one component file
///
/// A decode failure names the file; nothing else is touched.
pub fn read_component<T: TextCodec>(root: &Path, folder: &str, file: &str) -> ProjectResult<T> {
    let text = fs::read_to_string(root.join(folder).join(file))?;
    T::decode(&text).map_err(|e| ProjectError::format(display_path(folder, file), e))
}

/// Like `read_component`, but `None` when the file does not exist
pub fn read_optional<T: TextCodec>(
    root: &Path,
    folder: &str,
    file: &str,
) -> ProjectResult<Option<T>> {
    match read_component(root, folder, file) {
        Ok(value) => Ok(Some(value)),
        Err(ProjectError::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Encode and write a component outside of history (new projects)
pub fn write_component<T: TextCodec>(
    root: &Path,
    folder: &str,
    file: &str,
    value: &T,
) -> ProjectResult<()> {
    let dir = root.join(folder);
    fs::create_dir_all(&dir)?;
    fs::write(dir.join(file), value.encode())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::MidiRouting;
    use tempfile::tempdir;

    #[test]
    fn test_read_component_names_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(MIDI_ROUTING_FILE), "garbage\n").unwrap();

        let err = read_component::<MidiRouting>(dir.path(), "", MIDI_ROUTING_FILE).unwrap_err();
        assert!(matches!(&err, ProjectError::Format { file, .. } if file == MIDI_ROUTING_FILE));
    }

    #[test]
    fn test_read_optional_missing_file() {
        let dir = tempdir().unwrap();
        let value = read_optional::<MidiRouting>(dir.path(), "tracks", "4").unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let mut routing = MidiRouting::new();
        routing.set_route("Pads", 2, true);
        write_component(dir.path(), "", MIDI_ROUTING_FILE, &routing).unwrap();

        let read: MidiRouting = read_component(dir.path(), "", MIDI_ROUTING_FILE).unwrap();
        assert_eq!(read, routing);
    }
}

// Project module
// A project directory on disk and the session object that edits it

pub mod directory;
pub mod files;
pub mod manager;
pub mod options;
pub mod tracks;

pub use directory::ItemDirectory;
pub use manager::Project;
pub use options::ProjectOptions;
pub use tracks::{MAX_PLUGINS_PER_TRACK, PluginSlot, Track, TrackList, TrackPlugins};

// Sequencer module
// Items, their events, and the beat-indexed arrangement timeline

pub mod audio_clip;
pub mod events;
pub mod item;
pub mod marker;
pub mod quantize;
pub mod timeline;

pub use audio_clip::{AudioClip, AudioSend, FxControl, TimeStretchMode};
pub use events::{ControlChange, Note, Pitchbend};
pub use item::{Item, ItemUid, VelocityEdit};
pub use marker::{Marker, MarkerKind, TempoMarker, TimeSignature};
pub use quantize::{QUANTIZE_GRIDS, grid_to_beats};
pub use timeline::{SequencerItem, TRACK_COUNT, Timeline};

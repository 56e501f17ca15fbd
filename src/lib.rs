// tracklane - project timeline, automation, routing and history core

pub mod automation;
pub mod codec;
pub mod error;
pub mod history;
pub mod messaging;
pub mod project;
pub mod routing;
pub mod sampler;
pub mod sequencer;

// Re-export commonly used types for convenience
pub use automation::{AutomationPoint, AutomationRegion};
pub use codec::{FormatError, TextCodec};
pub use error::{ProjectError, ProjectResult, ReferenceKind};
pub use history::{Commit, FileSnapshot, HistoryLog};
pub use messaging::{ChannelNotifier, EngineEvent, Notifier, NullNotifier, create_event_channel};
pub use project::{ItemDirectory, Project, ProjectOptions, TrackList, TrackPlugins};
pub use routing::{MidiRouting, RouteKind, RoutingGraph, ToggleOutcome, TrackSend};
pub use sampler::{SamplePool, StretchCache, StretchParams, StretchRenderer, WavPool};
pub use sequencer::{
    AudioClip, ControlChange, Item, ItemUid, Marker, Note, Pitchbend, SequencerItem, TempoMarker,
    TimeSignature, Timeline,
};

// Engine notifications - what changed on disk after a successful mutation

use std::path::PathBuf;

/// Event sent to the audio engine after each successful mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    TimelineSaved,
    ItemSaved { uid: u32 },
    AutomationSaved,
    RoutingUpdated,
    MidiRoutingUpdated,
    TracksSaved,
    TrackPluginsSaved { track_uid: u32 },
    /// Undo or redo rewrote these files (relative to the project root)
    HistoryRestored { files: Vec<PathBuf> },
}

impl EngineEvent {
    /// Name the engine listens for
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::TimelineSaved => "region saved",
            EngineEvent::ItemSaved { .. } => "item saved",
            EngineEvent::AutomationSaved => "automation saved",
            EngineEvent::RoutingUpdated => "routing updated",
            EngineEvent::MidiRoutingUpdated => "midi routing updated",
            EngineEvent::TracksSaved => "tracks saved",
            EngineEvent::TrackPluginsSaved { .. } => "track plugins saved",
            EngineEvent::HistoryRestored { .. } => "history restored",
        }
    }
}

/// Receives engine events; implemented by the IPC layer
///
/// Called after the mutation is on disk. Implementations must not block.
pub trait Notifier {
    fn notify(&mut self, event: EngineEvent);
}

/// Notifier that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&mut self, _event: EngineEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(EngineEvent::TimelineSaved.name(), "region saved");
        assert_eq!(EngineEvent::ItemSaved { uid: 3 }.name(), "item saved");
        assert_eq!(EngineEvent::RoutingUpdated.name(), "routing updated");
    }

    #[test]
    fn test_null_notifier_accepts_events() {
        let mut notifier = NullNotifier;
        notifier.notify(EngineEvent::TracksSaved);
    }
}

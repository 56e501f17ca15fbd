// Routing module
// Track sends with feedback prevention, and MIDI input device routes

pub mod graph;
pub mod midi;

pub use graph::{MASTER_TRACK, RouteKind, RoutingGraph, SEND_SLOTS, ToggleOutcome, TrackSend};
pub use midi::{MidiRoute, MidiRouting};

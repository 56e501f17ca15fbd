// Messaging module - events from the project core to the audio engine

pub mod channels;
pub mod notification;

pub use channels::{ChannelNotifier, EventConsumer, create_event_channel};
pub use notification::{EngineEvent, Notifier, NullNotifier};

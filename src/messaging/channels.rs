// Communication channels lock-free

use crate::messaging::notification::{EngineEvent, Notifier};
use ringbuf::{
    HeapRb,
    traits::{Producer, Split},
};

pub type EventProducer = ringbuf::HeapProd<EngineEvent>;
pub type EventConsumer = ringbuf::HeapCons<EngineEvent>;

/// Notifier pushing events into a lock-free queue
///
/// A full queue drops the event with a warning instead of blocking.
pub struct ChannelNotifier {
    producer: EventProducer,
    dropped: usize,
}

impl ChannelNotifier {
    pub fn new(producer: EventProducer) -> Self {
        Self {
            producer,
            dropped: 0,
        }
    }

    /// Events lost because the queue was full
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&mut self, event: EngineEvent) {
        if let Err(event) = self.producer.try_push(event) {
            self.dropped += 1;
            log::warn!("Event queue full, dropping '{}'", event.name());
        }
    }
}

pub fn create_event_channel(capacity: usize) -> (ChannelNotifier, EventConsumer) {
    let rb = HeapRb::<EngineEvent>::new(capacity);
    let (producer, consumer) = rb.split();
    (ChannelNotifier::new(producer), consumer)
}

//! Hooks that observe the cascade as it runs.
//!
//! Listeners are called from worker threads for partition events and from
//! the host thread for everything else, so they must be cheap and `Sync`.

use parking_lot::Mutex;

/// Something that happened in the cascade
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CascadeEvent {
    /// A step's cascade was kicked off
    StepStarted(u64),
    /// A partition began evaluating its cells
    PartitionStarted(usize),
    /// A partition finished its cells and visual records
    PartitionFinished(usize),
    /// A batch was handed to the visual sink
    BatchPublished(usize),
    /// The step's staged state became current
    Committed(u64),
}

/// Side effect attached to the cascade
pub trait CascadeListener: Send + Sync {
    fn on_event(&self, event: CascadeEvent);
}

/// Logs every event at trace level
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingListener;

impl CascadeListener for TracingListener {
    fn on_event(&self, event: CascadeEvent) {
        tracing::trace!(?event, "cascade");
    }
}

/// Keeps every event in arrival order
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<CascadeEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CascadeEvent> {
        self.events.lock().clone()
    }

    /// Drain the recorded events
    pub fn take(&self) -> Vec<CascadeEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl CascadeListener for RecordingListener {
    fn on_event(&self, event: CascadeEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_listener_keeps_order() {
        let listener = RecordingListener::new();
        listener.on_event(CascadeEvent::StepStarted(0));
        listener.on_event(CascadeEvent::PartitionStarted(0));
        assert_eq!(
            listener.take(),
            vec![CascadeEvent::StepStarted(0), CascadeEvent::PartitionStarted(0)]
        );
        assert!(listener.events().is_empty());
    }
}

use crate::events::{EventBus, ReelcamEvent};
use crate::feed::policy::{PlaybackPolicy, VisibilityReport};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Write side of the feed's ActiveItemId.
///
/// Owned by the feed controller and only handed to its viewport observer.
#[derive(Clone)]
pub(crate) struct ActiveItemWriter {
    sender: Arc<watch::Sender<Option<String>>>,
    event_bus: Arc<EventBus>,
}

impl ActiveItemWriter {
    pub(crate) fn new(event_bus: Arc<EventBus>) -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
            event_bus,
        }
    }

    pub(crate) fn current(&self) -> Option<String> {
        self.sender.borrow().clone()
    }

    pub(crate) fn reader(&self) -> ActiveItemReader {
        ActiveItemReader {
            receiver: self.sender.subscribe(),
        }
    }

    /// Run the policy against the current value and publish the outcome
    pub(crate) fn apply(&self, policy: &PlaybackPolicy, reports: &[VisibilityReport]) -> Option<String> {
        let mut change = None;
        self.sender.send_if_modified(|current| {
            let next = policy.decide(current.as_deref(), reports);
            if next != *current {
                change = Some((current.clone(), next.clone()));
                *current = next;
                true
            } else {
                false
            }
        });

        match change {
            Some((previous, current)) => {
                info!("Active item changed: {:?} -> {:?}", previous, current);
                self.announce(previous, current.clone());
                current
            }
            None => {
                debug!("Visibility batch left active item unchanged");
                self.current()
            }
        }
    }

    /// Clear the active item if it is `item_id`
    pub(crate) fn clear_if(&self, item_id: &str) {
        let mut previous = None;
        self.sender.send_if_modified(|current| {
            if current.as_deref() == Some(item_id) {
                previous = current.take();
                true
            } else {
                false
            }
        });
        if previous.is_some() {
            self.announce(previous, None);
        }
    }

    pub(crate) fn reset(&self) {
        let previous = self.sender.send_replace(None);
        if previous.is_some() {
            self.announce(previous, None);
        }
    }

    fn announce(&self, previous: Option<String>, current: Option<String>) {
        if let Err(e) = self.event_bus.publish(ReelcamEvent::ActiveItemChanged {
            previous,
            current,
            timestamp: SystemTime::now(),
        }) {
            warn!("Failed to publish active item change: {}", e);
        }
    }
}

/// Read side of the feed's ActiveItemId; every item controller holds one
#[derive(Clone)]
pub struct ActiveItemReader {
    receiver: watch::Receiver<Option<String>>,
}

impl ActiveItemReader {
    pub fn current(&self) -> Option<String> {
        self.receiver.borrow().clone()
    }

    pub fn is_active(&self, item_id: &str) -> bool {
        self.receiver.borrow().as_deref() == Some(item_id)
    }

    /// Wait for the next change. Errors once the feed has been dropped.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.receiver.changed().await
    }

    /// Current value, marking it as seen
    pub fn current_and_mark_seen(&mut self) -> Option<String> {
        self.receiver.borrow_and_update().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventFilter;

    fn writer() -> (ActiveItemWriter, Arc<EventBus>) {
        let bus = Arc::new(EventBus::new(16));
        (ActiveItemWriter::new(Arc::clone(&bus)), bus)
    }

    #[tokio::test]
    async fn test_apply_publishes_change_once() {
        let (writer, bus) = writer();
        let mut events =
            bus.subscribe_filtered(EventFilter::EventTypes(vec!["active_item_changed"]), "t");
        let policy = PlaybackPolicy::default();

        let next = writer.apply(&policy, &[VisibilityReport::new("1", true, 1.0)]);
        assert_eq!(next, Some("1".to_string()));

        // Same outcome again: no second event
        writer.apply(&policy, &[VisibilityReport::new("1", true, 0.9)]);

        match events.try_recv().unwrap() {
            Some(ReelcamEvent::ActiveItemChanged {
                previous, current, ..
            }) => {
                assert_eq!(previous, None);
                assert_eq!(current, Some("1".to_string()));
            }
            other => panic!("Unexpected event: {:?}", other),
        }
        assert!(events.try_recv().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_readers_observe_writes() {
        let (writer, _bus) = writer();
        let mut reader = writer.reader();
        let policy = PlaybackPolicy::default();

        writer.apply(&policy, &[VisibilityReport::new("2", true, 0.8)]);
        reader.changed().await.unwrap();

        assert!(reader.is_active("2"));
        assert!(!reader.is_active("1"));

        writer.clear_if("1");
        assert_eq!(reader.current(), Some("2".to_string()));

        writer.clear_if("2");
        assert_eq!(reader.current(), None);
    }
}

use crate::error::EventBusError;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Events that can occur in the reelcam system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReelcamEvent {
    /// The feed's active item changed
    ActiveItemChanged {
        previous: Option<String>,
        current: Option<String>,
        timestamp: SystemTime,
    },
    /// A feed item's playback state changed
    PlaybackStateChanged {
        item_id: String,
        playing: bool,
        muted: bool,
    },
    /// A feed item was liked
    VideoLiked { item_id: String },
    /// A feed item was shared; `delivered` is false when no share capability took it
    VideoShared { item_id: String, delivered: bool },
    /// The detector produced a prediction set for a frame
    ObjectsDetected {
        frame_id: u64,
        count: usize,
        timestamp: SystemTime,
    },
    /// The configured label appeared in the camera view
    AlertRaised {
        label: String,
        vibrate_ms: u64,
        toast_seconds: u32,
        timestamp: SystemTime,
    },
    /// The configured label is no longer present
    AlertCleared { label: String, timestamp: SystemTime },
    /// Camera connection status changed
    CameraStatusChanged {
        connected: bool,
        timestamp: SystemTime,
    },
    /// A screenshot with overlay was written
    ScreenshotSaved { path: String },
    /// A system error occurred in a component
    SystemError { component: String, error: String },
    /// System shutdown requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl ReelcamEvent {
    /// Get the timestamp of the event
    pub fn timestamp(&self) -> SystemTime {
        match self {
            ReelcamEvent::ActiveItemChanged { timestamp, .. } => *timestamp,
            ReelcamEvent::ObjectsDetected { timestamp, .. } => *timestamp,
            ReelcamEvent::AlertRaised { timestamp, .. } => *timestamp,
            ReelcamEvent::AlertCleared { timestamp, .. } => *timestamp,
            ReelcamEvent::CameraStatusChanged { timestamp, .. } => *timestamp,
            ReelcamEvent::ShutdownRequested { timestamp, .. } => *timestamp,
            ReelcamEvent::PlaybackStateChanged { .. }
            | ReelcamEvent::VideoLiked { .. }
            | ReelcamEvent::VideoShared { .. }
            | ReelcamEvent::ScreenshotSaved { .. }
            | ReelcamEvent::SystemError { .. } => SystemTime::now(),
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            ReelcamEvent::ActiveItemChanged { current, .. } => match current {
                Some(id) => format!("Active item is now {}", id),
                None => "No active item".to_string(),
            },
            ReelcamEvent::PlaybackStateChanged {
                item_id,
                playing,
                muted,
            } => format!(
                "Item {} {} ({})",
                item_id,
                if *playing { "playing" } else { "paused" },
                if *muted { "muted" } else { "sound on" }
            ),
            ReelcamEvent::VideoLiked { item_id } => format!("Liked video: {}", item_id),
            ReelcamEvent::VideoShared { item_id, delivered } => {
                format!("Shared video: {} (delivered: {})", item_id, delivered)
            }
            ReelcamEvent::ObjectsDetected {
                frame_id, count, ..
            } => format!("{} objects detected in frame {}", count, frame_id),
            ReelcamEvent::AlertRaised { label, .. } => format!("Alert: {} detected!", label),
            ReelcamEvent::AlertCleared { label, .. } => format!("Alert cleared: {}", label),
            ReelcamEvent::CameraStatusChanged { connected, .. } => {
                format!(
                    "Camera {}",
                    if *connected {
                        "connected"
                    } else {
                        "disconnected"
                    }
                )
            }
            ReelcamEvent::ScreenshotSaved { path } => format!("Screenshot saved: {}", path),
            ReelcamEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
            ReelcamEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            ReelcamEvent::ActiveItemChanged { .. } => "active_item_changed",
            ReelcamEvent::PlaybackStateChanged { .. } => "playback_state_changed",
            ReelcamEvent::VideoLiked { .. } => "video_liked",
            ReelcamEvent::VideoShared { .. } => "video_shared",
            ReelcamEvent::ObjectsDetected { .. } => "objects_detected",
            ReelcamEvent::AlertRaised { .. } => "alert_raised",
            ReelcamEvent::AlertCleared { .. } => "alert_cleared",
            ReelcamEvent::CameraStatusChanged { .. } => "camera_status_changed",
            ReelcamEvent::ScreenshotSaved { .. } => "screenshot_saved",
            ReelcamEvent::SystemError { .. } => "system_error",
            ReelcamEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Async event bus for component coordination using broadcast channels
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ReelcamEvent>,
    debug_logging: bool,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: false,
        }
    }

    /// Create a new event bus with debug logging enabled
    pub fn with_debug_logging(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: true,
        }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<ReelcamEvent> {
        self.sender.subscribe()
    }

    /// Subscribe with a filter
    pub fn subscribe_filtered(&self, filter: EventFilter, name: &str) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe(), filter, name.to_string())
    }

    /// Publish an event to all subscribers.
    ///
    /// Publishing with no subscribers is not an error; it returns `Ok(0)`.
    pub fn publish(&self, event: ReelcamEvent) -> Result<usize, EventBusError> {
        if self.debug_logging {
            debug!("Publishing event: {}", event.description());
        }

        match &event {
            ReelcamEvent::AlertRaised { label, .. } => {
                warn!("{} detected! Alarm!", label);
            }
            ReelcamEvent::SystemError { component, error } => {
                error!("System error in {}: {}", component, error);
            }
            ReelcamEvent::CameraStatusChanged { connected, .. } => {
                if *connected {
                    info!("Camera connected");
                } else {
                    warn!("Camera disconnected");
                }
            }
            ReelcamEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => {
                if self.debug_logging {
                    debug!("Event: {}", event.description());
                }
            }
        }

        if self.sender.receiver_count() == 0 {
            return Ok(0);
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Accept events from specific components (for SystemError events)
    Components(Vec<String>),
    /// Custom filter function
    Custom(fn(&ReelcamEvent) -> bool),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &ReelcamEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Components(components) => {
                if let ReelcamEvent::SystemError { component, .. } = event {
                    components.contains(component)
                } else {
                    false
                }
            }
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Event receiver with filtering capabilities
pub struct EventReceiver {
    receiver: broadcast::Receiver<ReelcamEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    /// Create a new event receiver with a filter
    pub fn new(
        receiver: broadcast::Receiver<ReelcamEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<ReelcamEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { count: n });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<ReelcamEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => {
                    return Ok(None);
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { count: n });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let subscriber_count = event_bus
            .publish(ReelcamEvent::VideoLiked {
                item_id: "3".to_string(),
            })
            .unwrap();
        assert_eq!(subscriber_count, 1);

        match receiver.recv().await.unwrap() {
            ReelcamEvent::VideoLiked { item_id } => assert_eq!(item_id, "3"),
            _ => panic!("Unexpected event type"),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let event_bus = EventBus::new(10);
        let count = event_bus
            .publish(ReelcamEvent::ScreenshotSaved {
                path: "/tmp/x.jpg".to_string(),
            })
            .unwrap();
        assert_eq!(count, 0);
        assert!(!event_bus.has_subscribers());
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();

        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus
            .publish(ReelcamEvent::CameraStatusChanged {
                connected: true,
                timestamp: SystemTime::now(),
            })
            .unwrap();

        let _ = timeout(Duration::from_millis(100), receiver1.recv())
            .await
            .unwrap()
            .unwrap();
        let _ = timeout(Duration::from_millis(100), receiver2.recv())
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_event_filter() {
        let filter = EventFilter::EventTypes(vec!["alert_raised", "alert_cleared"]);

        let raised = ReelcamEvent::AlertRaised {
            label: "person".to_string(),
            vibrate_ms: 1000,
            toast_seconds: 3,
            timestamp: SystemTime::now(),
        };
        let detected = ReelcamEvent::ObjectsDetected {
            frame_id: 1,
            count: 2,
            timestamp: SystemTime::now(),
        };

        assert!(filter.matches(&raised));
        assert!(!filter.matches(&detected));

        let components = EventFilter::Components(vec!["camera_view".to_string()]);
        assert!(components.matches(&ReelcamEvent::SystemError {
            component: "camera_view".to_string(),
            error: "boom".to_string(),
        }));
        assert!(!components.matches(&raised));
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe_filtered(
            EventFilter::EventTypes(vec!["video_shared"]),
            "share_watcher",
        );

        event_bus
            .publish(ReelcamEvent::VideoLiked {
                item_id: "1".to_string(),
            })
            .unwrap();
        event_bus
            .publish(ReelcamEvent::VideoShared {
                item_id: "2".to_string(),
                delivered: false,
            })
            .unwrap();

        let event = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.event_type(), "video_shared");
        assert!(receiver.try_recv().unwrap().is_none());
    }
}

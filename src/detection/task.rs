use crate::config::DetectionConfig;
use crate::detection::alert::{AlertLatch, AlertTransition};
use crate::detection::detector::Detector;
use crate::detection::types::{Detection, Predictions};
use crate::events::{EventBus, ReelcamEvent};
use crate::frame::FrameData;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Most recent prediction set, shared between the loop, the overlay and screenshots
#[derive(Debug, Clone, Default)]
pub struct PredictionStore {
    latest: Arc<RwLock<Option<Predictions>>>,
}

impl PredictionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, frame_id: u64, detections: Vec<Detection>) {
        *self.latest.write() = Some(Predictions {
            frame_id,
            detections,
            timestamp: SystemTime::now(),
        });
    }

    pub fn latest(&self) -> Option<Predictions> {
        self.latest.read().clone()
    }

    pub fn detections(&self) -> Vec<Detection> {
        self.latest
            .read()
            .as_ref()
            .map(|p| p.detections.clone())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.latest
            .read()
            .as_ref()
            .map(|p| p.detections.is_empty())
            .unwrap_or(true)
    }

    pub fn clear(&self) {
        *self.latest.write() = None;
    }
}

/// Everything one run of the loop needs
pub struct DetectionContext {
    pub detector: Arc<dyn Detector>,
    pub frames: watch::Receiver<Option<FrameData>>,
    pub predictions: PredictionStore,
    pub event_bus: Arc<EventBus>,
    pub config: DetectionConfig,
}

/// Per-frame detection as an explicit repeating task.
///
/// After [`DetectionLoop::cancel`] returns the detector is never invoked again.
pub struct DetectionLoop {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    alarm: Arc<AtomicBool>,
}

impl DetectionLoop {
    /// Spawn the loop. At most one detector call per display refresh, only on new, ready frames.
    pub fn start(context: DetectionContext) -> Self {
        let cancel = CancellationToken::new();
        let alarm = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(run(context, cancel.clone(), Arc::clone(&alarm)));

        Self {
            cancel,
            task: Some(task),
            alarm,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    /// Whether the alert label is currently present
    pub fn alarm_active(&self) -> bool {
        self.alarm.load(Ordering::SeqCst)
    }

    pub fn alarm_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.alarm)
    }

    /// Stop the loop and wait for it to exit; returns false if it was already stopped
    pub async fn cancel(&mut self) -> bool {
        self.cancel.cancel();
        match self.task.take() {
            Some(task) => {
                if let Err(e) = task.await {
                    if !e.is_cancelled() {
                        warn!("Detection loop ended abnormally: {}", e);
                    }
                }
                info!("Detection loop cancelled");
                true
            }
            None => false,
        }
    }
}

impl Drop for DetectionLoop {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(context: DetectionContext, cancel: CancellationToken, alarm: Arc<AtomicBool>) {
    let DetectionContext {
        detector,
        frames,
        predictions,
        event_bus,
        config,
    } = context;

    let period = Duration::from_secs_f64(1.0 / config.refresh_hz.max(1) as f64);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut latch = AlertLatch::new(config.alert_label.clone(), config.min_confidence);
    let mut last_frame_id: Option<u64> = None;

    info!(
        "Detection loop started (model '{}', {} Hz, alert on '{}')",
        detector.model_name(),
        config.refresh_hz,
        config.alert_label
    );

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let frame = match frames.borrow().as_ref() {
            Some(frame) if frame.is_ready() && Some(frame.id) != last_frame_id => frame.clone(),
            _ => {
                trace!("No new frame ready for detection");
                continue;
            }
        };
        last_frame_id = Some(frame.id);

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            outcome = detector.detect(&frame) => outcome,
        };

        let detections = match outcome {
            Ok(detections) => detections,
            Err(e) => {
                warn!("Detection failed, skipping frame {}: {}", frame.id, e);
                continue;
            }
        };

        debug!("Frame {}: {} detections", frame.id, detections.len());
        let transition = latch.update(&detections);
        let count = detections.len();
        predictions.update(frame.id, detections);

        publish(
            &event_bus,
            ReelcamEvent::ObjectsDetected {
                frame_id: frame.id,
                count,
                timestamp: SystemTime::now(),
            },
        );

        match transition {
            Some(AlertTransition::Raised) => {
                alarm.store(true, Ordering::SeqCst);
                publish(
                    &event_bus,
                    ReelcamEvent::AlertRaised {
                        label: latch.label().to_string(),
                        vibrate_ms: config.alert_vibrate_ms,
                        toast_seconds: config.alert_toast_seconds,
                        timestamp: SystemTime::now(),
                    },
                );
            }
            Some(AlertTransition::Cleared) => {
                alarm.store(false, Ordering::SeqCst);
                info!("'{}' no longer in view", latch.label());
                publish(
                    &event_bus,
                    ReelcamEvent::AlertCleared {
                        label: latch.label().to_string(),
                        timestamp: SystemTime::now(),
                    },
                );
            }
            None => {}
        }
    }

    alarm.store(false, Ordering::SeqCst);
    debug!("Detection loop exited");
}

fn publish(event_bus: &EventBus, event: ReelcamEvent) {
    if let Err(e) = event_bus.publish(event) {
        warn!("Failed to publish detection event: {}", e);
    }
}

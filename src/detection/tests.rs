use super::*;
use crate::config::{DetectionConfig, ReelcamConfig};
use crate::error::DetectorError;
use crate::events::{EventBus, EventFilter, ReelcamEvent};
use crate::frame::{FrameData, FrameFormat};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;

fn frame(id: u64) -> FrameData {
    FrameData::new(id, SystemTime::now(), vec![0u8; 4 * 4 * 3], 4, 4, FrameFormat::Rgb24)
}

fn person() -> Detection {
    Detection::new("person", 0.9, BoundingBox::new(1.0, 1.0, 2.0, 2.0))
}

struct Harness {
    detector: ScriptedDetector,
    frames: watch::Sender<Option<FrameData>>,
    predictions: PredictionStore,
    bus: Arc<EventBus>,
    detection: DetectionLoop,
}

fn start(config: DetectionConfig) -> Harness {
    let detector = ScriptedDetector::new("coco-ssd");
    let (frames, frame_rx) = watch::channel(None);
    let predictions = PredictionStore::new();
    let bus = Arc::new(EventBus::new(64));
    let detection = DetectionLoop::start(DetectionContext {
        detector: Arc::new(detector.clone()),
        frames: frame_rx,
        predictions: predictions.clone(),
        event_bus: Arc::clone(&bus),
        config,
    });
    Harness {
        detector,
        frames,
        predictions,
        bus,
        detection,
    }
}

fn detection_config() -> DetectionConfig {
    ReelcamConfig::default().detection
}

#[tokio::test(start_paused = true)]
async fn test_detector_waits_for_a_ready_frame() {
    let h = start(detection_config());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.detector.invocations(), 0);

    h.frames.send_replace(Some(frame(1)));
    tokio::time::sleep(Duration::from_millis(100)).await;
    // Same frame is not analysed twice
    assert_eq!(h.detector.invocations(), 1);

    h.frames.send_replace(Some(frame(2)));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.detector.invocations(), 2);
    assert_eq!(h.predictions.latest().map(|p| p.frame_id), Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_rate_bounded_by_refresh() {
    let mut config = detection_config();
    config.refresh_hz = 10;
    let h = start(config);

    for id in 0..20u64 {
        h.frames.send_replace(Some(frame(id)));
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    // 200ms at 10 Hz
    let calls = h.detector.invocations();
    assert!((2..=3).contains(&calls), "unexpected call count {}", calls);
}

#[tokio::test(start_paused = true)]
async fn test_no_invocations_after_cancel() {
    let mut h = start(detection_config());
    h.frames.send_replace(Some(frame(1)));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(h.detection.cancel().await);
    let calls = h.detector.invocations();
    assert!(!h.detection.is_running());

    for id in 2..10 {
        h.frames.send_replace(Some(frame(id)));
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(h.detector.invocations(), calls);
    assert!(!h.detection.cancel().await);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_slow_detection() {
    let detector = ScriptedDetector::new("slow").with_latency(Duration::from_secs(10));
    detector.set_detections(vec![person()]);
    let (frames, frame_rx) = watch::channel(Some(frame(1)));
    let predictions = PredictionStore::new();
    let mut detection = DetectionLoop::start(DetectionContext {
        detector: Arc::new(detector.clone()),
        frames: frame_rx,
        predictions: predictions.clone(),
        event_bus: Arc::new(EventBus::new(8)),
        config: detection_config(),
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(detector.invocations(), 1);

    detection.cancel().await;
    frames.send_replace(Some(frame(2)));
    tokio::time::sleep(Duration::from_secs(20)).await;

    assert_eq!(detector.invocations(), 1);
    assert!(predictions.latest().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_detector_errors_skip_frame_and_continue() {
    let h = start(detection_config());
    h.detector.fail_next(DetectorError::Inference {
        frame_id: 1,
        details: "backend busy".to_string(),
    });
    h.detector.set_detections(vec![person()]);

    h.frames.send_replace(Some(frame(1)));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.predictions.latest().is_none());

    h.frames.send_replace(Some(frame(2)));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.predictions.detections(), vec![person()]);
    assert!(h.detection.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_alert_is_edge_triggered() {
    let h = start(detection_config());
    let mut alerts = h.bus.subscribe_filtered(
        EventFilter::EventTypes(vec!["alert_raised", "alert_cleared"]),
        "alert_test",
    );

    h.detector.set_detections(vec![person()]);
    for id in 1..5 {
        h.frames.send_replace(Some(frame(id)));
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(h.detection.alarm_active());

    h.detector.set_detections(Vec::new());
    h.frames.send_replace(Some(frame(5)));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!h.detection.alarm_active());

    match alerts.try_recv().unwrap() {
        Some(ReelcamEvent::AlertRaised {
            label,
            vibrate_ms,
            toast_seconds,
            ..
        }) => {
            assert_eq!(label, "person");
            assert_eq!(vibrate_ms, 1000);
            assert_eq!(toast_seconds, 3);
        }
        other => panic!("Expected AlertRaised, got {:?}", other),
    }
    assert!(matches!(
        alerts.try_recv().unwrap(),
        Some(ReelcamEvent::AlertCleared { .. })
    ));
    assert!(alerts.try_recv().unwrap().is_none());
}

#[tokio::test]
async fn test_scripted_loader_failure() {
    let loader = ScriptedLoader::failing("no network");
    let result = loader.load("coco-ssd").await;
    assert!(matches!(result, Err(DetectorError::ModelLoad { .. })));
    assert_eq!(loader.loads(), 1);
}

#[test]
fn test_toggle_person() {
    let detector = ScriptedDetector::new("m");
    assert!(detector.toggle_person((100, 100)));
    assert!(!detector.toggle_person((100, 100)));
}

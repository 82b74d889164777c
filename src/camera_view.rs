use crate::camera::{CameraSource, MediaStream};
use crate::config::ReelcamConfig;
use crate::detection::{
    label_anchor, scale_detections, Detection, DetectionContext, DetectionLoop, Detector,
    DetectorLoader, OverlayStyle, PredictionStore,
};
use crate::error::{CameraError, ReelcamError, Result, INIT_FAILURE_MESSAGE};
use crate::events::{EventBus, ReelcamEvent};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[cfg(feature = "overlay")]
use crate::detection::{save_screenshot, OverlayRenderer};

/// Lifecycle of one camera view session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraViewStatus {
    Idle,
    Loading,
    Ready,
    /// Terminal; needs a manual reload
    PermissionDenied,
    /// Terminal; carries the user-facing message
    Failed(String),
    Closed,
}

impl CameraViewStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CameraViewStatus::PermissionDenied | CameraViewStatus::Failed(_) | CameraViewStatus::Closed
        )
    }

    /// Text shown in place of the video
    pub fn message(&self) -> Option<String> {
        match self {
            CameraViewStatus::Loading => Some("Loading AI camera...".to_string()),
            CameraViewStatus::PermissionDenied => Some(CameraError::PermissionDenied.user_message()),
            CameraViewStatus::Failed(message) => Some(message.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeardownReason {
    Unmount,
    TrackEnded,
}

/// What a teardown released
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeardownReport {
    pub reason: TeardownReason,
    pub tracks_stopped: usize,
    pub all_tracks_stopped: bool,
    pub detection_cancelled: bool,
}

/// Resources that must be released on every exit path
#[derive(Default)]
struct Session {
    stream: Option<MediaStream>,
    detection: Option<DetectionLoop>,
}

impl Session {
    async fn release(&mut self, reason: TeardownReason) -> TeardownReport {
        let detection_cancelled = match self.detection.as_mut() {
            Some(detection) => {
                detection.cancel().await;
                true
            }
            None => false,
        };
        self.detection = None;

        let (tracks_stopped, all_tracks_stopped) = match self.stream.take() {
            Some(stream) => {
                let stopped = stream.stop_all_tracks();
                (stopped, stream.all_tracks_stopped())
            }
            None => (0, true),
        };

        info!(
            "Camera session released ({:?}): {} tracks stopped, detection cancelled: {}",
            reason, tracks_stopped, detection_cancelled
        );

        TeardownReport {
            reason,
            tracks_stopped,
            all_tracks_stopped,
            detection_cancelled,
        }
    }
}

/// Camera view core: acquire the stream and detector, run detection, guarantee release
pub struct CameraView {
    config: ReelcamConfig,
    source: Arc<dyn CameraSource>,
    loader: Arc<dyn DetectorLoader>,
    event_bus: Arc<EventBus>,
    session_id: Uuid,
    status: Arc<watch::Sender<CameraViewStatus>>,
    session: Arc<Mutex<Session>>,
    detector: Option<Arc<dyn Detector>>,
    predictions: PredictionStore,
    alarm: Option<Arc<std::sync::atomic::AtomicBool>>,
    frame_size: (u32, u32),
    watcher: Option<(CancellationToken, JoinHandle<()>)>,
    #[cfg(feature = "overlay")]
    renderer: Arc<OverlayRenderer>,
}

impl CameraView {
    pub fn new(
        config: ReelcamConfig,
        source: Arc<dyn CameraSource>,
        loader: Arc<dyn DetectorLoader>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        #[cfg(feature = "overlay")]
        let renderer = match OverlayRenderer::load(&config.screenshot.font_path) {
            Ok(renderer) => renderer,
            Err(e) => {
                warn!("{}; drawing boxes without labels", e);
                OverlayRenderer::without_labels()
            }
        };

        let (status, _) = watch::channel(CameraViewStatus::Idle);
        let session_id = Uuid::new_v4();
        debug!("Created camera view session {}", session_id);

        Self {
            frame_size: config.camera.resolution,
            config,
            source,
            loader,
            event_bus,
            session_id,
            status: Arc::new(status),
            session: Arc::new(Mutex::new(Session::default())),
            detector: None,
            predictions: PredictionStore::new(),
            alarm: None,
            watcher: None,
            #[cfg(feature = "overlay")]
            renderer: Arc::new(renderer),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn status(&self) -> CameraViewStatus {
        self.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<CameraViewStatus> {
        self.status.subscribe()
    }

    pub fn predictions(&self) -> &PredictionStore {
        &self.predictions
    }

    pub fn has_detector(&self) -> bool {
        self.detector.is_some()
    }

    /// Intrinsic video size
    pub fn frame_size(&self) -> (u32, u32) {
        self.frame_size
    }

    pub fn alert_active(&self) -> bool {
        self.alarm
            .as_ref()
            .map(|flag| flag.load(std::sync::atomic::Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Load the model, open the camera and start detection.
    ///
    /// Any failure leaves the view in a terminal status; there is no automatic retry.
    pub async fn mount(&mut self) -> Result<()> {
        if self.status() != CameraViewStatus::Idle {
            warn!("Camera view already mounted ({:?})", self.status());
            return Ok(());
        }
        self.status.send_replace(CameraViewStatus::Loading);
        info!("Mounting camera view {}", self.session_id);

        let detector = match self.loader.load(&self.config.detection.model_name).await {
            Ok(detector) => detector,
            Err(e) => {
                error!("Failed to load detection model: {}", e);
                self.fail(CameraViewStatus::Failed(INIT_FAILURE_MESSAGE.to_string()), &e.to_string());
                return Err(e.into());
            }
        };

        let stream = match self.source.open(&self.config.camera).await {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to open camera via {}: {}", self.source.name(), e);
                let status = if e.is_permission_denied() {
                    CameraViewStatus::PermissionDenied
                } else {
                    CameraViewStatus::Failed(e.user_message())
                };
                self.fail(status, &e.to_string());
                return Err(ReelcamError::Camera(e));
            }
        };

        self.frame_size = stream.size();
        let ended = stream.tracks().first().map(|track| track.ended_token());

        let detection = DetectionLoop::start(DetectionContext {
            detector: Arc::clone(&detector),
            frames: stream.frames(),
            predictions: self.predictions.clone(),
            event_bus: Arc::clone(&self.event_bus),
            config: self.config.detection.clone(),
        });
        self.alarm = Some(detection.alarm_flag());

        {
            let mut session = self.session.lock().await;
            session.stream = Some(stream);
            session.detection = Some(detection);
        }
        self.detector = Some(detector);

        if let Some(ended) = ended {
            self.spawn_track_watcher(ended);
        }

        self.status.send_replace(CameraViewStatus::Ready);
        self.publish(ReelcamEvent::CameraStatusChanged {
            connected: true,
            timestamp: SystemTime::now(),
        });
        info!("Camera view {} ready", self.session_id);
        Ok(())
    }

    /// Release everything when the source ends the track (device loss, permission revoked)
    fn spawn_track_watcher(&mut self, ended: CancellationToken) {
        let stop = CancellationToken::new();
        let stopped = stop.clone();
        let session = Arc::clone(&self.session);
        let status = Arc::clone(&self.status);
        let event_bus = Arc::clone(&self.event_bus);

        let task = tokio::spawn(async move {
            tokio::select! {
                _ = stopped.cancelled() => {}
                _ = ended.cancelled() => {
                    warn!("Camera track ended, tearing down session");
                    session.lock().await.release(TeardownReason::TrackEnded).await;
                    status.send_replace(CameraViewStatus::Closed);
                    if let Err(e) = event_bus.publish(ReelcamEvent::CameraStatusChanged {
                        connected: false,
                        timestamp: SystemTime::now(),
                    }) {
                        warn!("Failed to publish camera status: {}", e);
                    }
                }
            }
        });

        self.watcher = Some((stop, task));
    }

    /// Stop detection and every media track. Safe to call more than once.
    pub async fn unmount(&mut self) -> TeardownReport {
        if let Some((stop, task)) = self.watcher.take() {
            stop.cancel();
            let _ = task.await;
        }

        let report = self.session.lock().await.release(TeardownReason::Unmount).await;

        let was_connected = self.status() == CameraViewStatus::Ready;
        self.status.send_if_modified(|status| {
            if matches!(status, CameraViewStatus::Idle | CameraViewStatus::Loading | CameraViewStatus::Ready) {
                *status = CameraViewStatus::Closed;
                true
            } else {
                false
            }
        });
        if was_connected {
            self.publish(ReelcamEvent::CameraStatusChanged {
                connected: false,
                timestamp: SystemTime::now(),
            });
        }

        report
    }

    /// Boxes in canvas coordinates paired with their label baselines
    pub fn overlay_boxes(&self, canvas: (u32, u32)) -> Vec<(Detection, (f32, f32))> {
        let style = OverlayStyle::live(&self.config.screenshot);
        scale_detections(&self.predictions.detections(), self.frame_size, canvas)
            .into_iter()
            .map(|d| {
                let anchor = label_anchor(&d.bounding_box, &style);
                (d, anchor)
            })
            .collect()
    }

    /// Transparent overlay layer for a canvas of the given size
    #[cfg(feature = "overlay")]
    pub fn render_overlay(&self, canvas: (u32, u32)) -> image::RgbaImage {
        let mut layer = image::RgbaImage::new(canvas.0, canvas.1);
        let detections = scale_detections(&self.predictions.detections(), self.frame_size, canvas);
        self.renderer
            .draw(&mut layer, &detections, &OverlayStyle::live(&self.config.screenshot));
        if self.alert_active() {
            self.renderer.draw_alarm_border(&mut layer, 4);
        }
        layer
    }

    /// Whether a screenshot can be taken right now
    pub fn can_capture(&self) -> bool {
        self.detector.is_some() && !self.predictions.is_empty()
    }

    /// Save the current frame with the latest predictions burned in
    #[cfg(feature = "overlay")]
    pub async fn capture_screenshot(&self) -> Result<PathBuf> {
        if !self.can_capture() {
            return Err(ReelcamError::component(
                "camera_view",
                "Screenshot unavailable: no detector or no predictions",
            ));
        }

        let frame = {
            let session = self.session.lock().await;
            session.stream.as_ref().and_then(|stream| stream.latest_frame())
        }
        .ok_or_else(|| ReelcamError::component("camera_view", "No frame available"))?;

        let path = save_screenshot(
            frame,
            self.predictions.detections(),
            &self.config.screenshot,
            Arc::clone(&self.renderer),
        )
        .await?;

        self.publish(ReelcamEvent::ScreenshotSaved {
            path: path.display().to_string(),
        });
        Ok(path)
    }

    #[cfg(not(feature = "overlay"))]
    pub async fn capture_screenshot(&self) -> Result<PathBuf> {
        Err(ReelcamError::overlay("Built without overlay support"))
    }

    fn fail(&self, status: CameraViewStatus, details: &str) {
        self.status.send_replace(status);
        self.publish(ReelcamEvent::SystemError {
            component: "camera_view".to_string(),
            error: details.to_string(),
        });
    }

    fn publish(&self, event: ReelcamEvent) {
        if let Err(e) = self.event_bus.publish(event) {
            warn!("Failed to publish camera view event: {}", e);
        }
    }
}

impl Drop for CameraView {
    fn drop(&mut self) {
        if let Some((stop, _)) = self.watcher.take() {
            stop.cancel();
        }
        // Best effort when unmount was skipped; the loop stops on its own once its token is cancelled
        if let Ok(mut session) = self.session.try_lock() {
            if let Some(stream) = session.stream.take() {
                if stream.stop_all_tracks() > 0 {
                    warn!("Camera view dropped without unmount; tracks stopped");
                }
            }
            session.detection = None;
        }
    }
}

use crate::detection::types::{BoundingBox, Detection};
use crate::error::DetectorError;
use crate::frame::FrameData;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Opaque object detector: frame in, labelled boxes out. May be slower than the frame rate.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, frame: &FrameData) -> Result<Vec<Detection>, DetectorError>;

    fn model_name(&self) -> &str;
}

/// Loads a pre-trained model by name
#[async_trait]
pub trait DetectorLoader: Send + Sync {
    async fn load(&self, model_name: &str) -> Result<Arc<dyn Detector>, DetectorError>;
}

#[derive(Debug, Default)]
struct Script {
    detections: Vec<Detection>,
    failures: VecDeque<DetectorError>,
    latency: Duration,
    invocations: u64,
}

/// Detector that returns whatever it was told to see. Clones share the script.
#[derive(Debug, Clone)]
pub struct ScriptedDetector {
    model: String,
    script: Arc<Mutex<Script>>,
}

impl ScriptedDetector {
    pub fn new<S: Into<String>>(model: S) -> Self {
        Self {
            model: model.into(),
            script: Arc::default(),
        }
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        self.script.lock().latency = latency;
        self
    }

    pub fn set_detections(&self, detections: Vec<Detection>) {
        self.script.lock().detections = detections;
    }

    /// Add or remove a centred person box; returns whether one is now present
    pub fn toggle_person(&self, frame_size: (u32, u32)) -> bool {
        let mut script = self.script.lock();
        if script.detections.iter().any(|d| d.label == "person") {
            script.detections.retain(|d| d.label != "person");
            false
        } else {
            let (w, h) = (frame_size.0 as f32, frame_size.1 as f32);
            script.detections.push(Detection::new(
                "person",
                0.91,
                BoundingBox::new(w * 0.3, h * 0.2, w * 0.4, h * 0.7),
            ));
            true
        }
    }

    pub fn fail_next(&self, error: DetectorError) {
        self.script.lock().failures.push_back(error);
    }

    pub fn invocations(&self) -> u64 {
        self.script.lock().invocations
    }
}

#[async_trait]
impl Detector for ScriptedDetector {
    async fn detect(&self, frame: &FrameData) -> Result<Vec<Detection>, DetectorError> {
        let (latency, outcome) = {
            let mut script = self.script.lock();
            script.invocations += 1;
            let outcome = match script.failures.pop_front() {
                Some(error) => Err(error),
                None => Ok(script.detections.clone()),
            };
            (script.latency, outcome)
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        debug!("Scripted detection on frame {}", frame.id);
        outcome
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Loader handing out a shared [`ScriptedDetector`], or failing
#[derive(Debug, Clone)]
pub struct ScriptedLoader {
    detector: ScriptedDetector,
    failure: Option<String>,
    loads: Arc<AtomicU32>,
}

impl ScriptedLoader {
    pub fn new(detector: ScriptedDetector) -> Self {
        Self {
            detector,
            failure: None,
            loads: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn failing<S: Into<String>>(details: S) -> Self {
        Self {
            failure: Some(details.into()),
            ..Self::new(ScriptedDetector::new("unavailable"))
        }
    }

    pub fn detector(&self) -> &ScriptedDetector {
        &self.detector
    }

    pub fn loads(&self) -> u32 {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DetectorLoader for ScriptedLoader {
    async fn load(&self, model_name: &str) -> Result<Arc<dyn Detector>, DetectorError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(details) = &self.failure {
            return Err(DetectorError::ModelLoad {
                model: model_name.to_string(),
                details: details.clone(),
            });
        }
        info!("Loaded scripted detector for model '{}'", model_name);
        Ok(Arc::new(self.detector.clone()))
    }
}

mod alert;
mod detector;
mod overlay;
mod screenshot;
mod task;
mod types;
#[cfg(test)]
mod tests;

pub use alert::{AlertLatch, AlertTransition};
pub use detector::{Detector, DetectorLoader, ScriptedDetector, ScriptedLoader};
#[cfg(feature = "overlay")]
pub use overlay::OverlayRenderer;
pub use overlay::{label_anchor, scale_detections, OverlayStyle};
#[cfg(feature = "overlay")]
pub use screenshot::save_screenshot;
pub use screenshot::{screenshot_path, timestamped_file_name};
pub use task::{DetectionContext, DetectionLoop, PredictionStore};
pub use types::{BoundingBox, Detection, Predictions};

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Axis-aligned box `[x, y, width, height]` in intrinsic video pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_array([x, y, width, height]: [f32; 4]) -> Self {
        Self::new(x, y, width, height)
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.x, self.y, self.width, self.height]
    }

    pub fn scaled(&self, sx: f32, sy: f32) -> Self {
        Self::new(self.x * sx, self.y * sy, self.width * sx, self.height * sy)
    }
}

/// One labelled object found in a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    /// Detector score, 0..=1
    pub confidence: f32,
    #[serde(rename = "bbox")]
    pub bounding_box: BoundingBox,
}

impl Detection {
    pub fn new<S: Into<String>>(label: S, confidence: f32, bounding_box: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bounding_box,
        }
    }

    /// Box label, e.g. `person (87%)`
    pub fn caption(&self) -> String {
        format!("{} ({}%)", self.label, (self.confidence * 100.0).round() as i32)
    }
}

/// Latest prediction set produced by the detection loop
#[derive(Debug, Clone, PartialEq)]
pub struct Predictions {
    pub frame_id: u64,
    pub detections: Vec<Detection>,
    pub timestamp: SystemTime,
}

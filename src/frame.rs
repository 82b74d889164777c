use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;

#[cfg(feature = "overlay")]
use crate::error::{ReelcamError, Result};

/// Pixel layout of a captured camera frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// Motion JPEG, one compressed image per frame
    Mjpeg,
    /// Packed 8-bit RGB
    Rgb24,
    /// Packed 8-bit RGBA
    Rgba32,
}

impl FrameFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            FrameFormat::Mjpeg => 0, // variable, compressed
            FrameFormat::Rgb24 => 3,
            FrameFormat::Rgba32 => 4,
        }
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, FrameFormat::Mjpeg)
    }
}

/// A single frame from the camera stream. Pixel data is shared, so clones are cheap.
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Monotonic per-stream identifier
    pub id: u64,
    pub timestamp: SystemTime,
    pub data: Arc<Vec<u8>>,
    /// Intrinsic width in pixels
    pub width: u32,
    /// Intrinsic height in pixels
    pub height: u32,
    pub format: FrameFormat,
}

impl FrameData {
    pub fn new(
        id: u64,
        timestamp: SystemTime,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
            format,
        }
    }

    /// Expected byte length for uncompressed formats
    pub fn expected_size(&self) -> Option<usize> {
        if self.format.is_compressed() {
            None
        } else {
            Some(self.width as usize * self.height as usize * self.format.bytes_per_pixel())
        }
    }

    pub fn validate_size(&self) -> bool {
        match self.expected_size() {
            Some(expected) => self.data.len() == expected,
            None => true,
        }
    }

    /// A frame is ready once it carries pixel data with a non-zero size
    pub fn is_ready(&self) -> bool {
        self.width > 0 && self.height > 0 && !self.data.is_empty() && self.validate_size()
    }

    pub fn age_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.timestamp)
            .unwrap_or_default()
            .as_millis() as u64
    }

    /// Decode into an RGBA canvas for drawing
    #[cfg(feature = "overlay")]
    pub fn to_rgba_image(&self) -> Result<image::RgbaImage> {
        use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};

        let data = self.data.as_ref().clone();
        match self.format {
            FrameFormat::Mjpeg => image::load_from_memory_with_format(&data, ImageFormat::Jpeg)
                .map(|img| img.to_rgba8())
                .map_err(|e| ReelcamError::overlay(format!("Failed to decode frame {}: {}", self.id, e))),
            FrameFormat::Rgb24 => RgbImage::from_raw(self.width, self.height, data)
                .map(|img| DynamicImage::ImageRgb8(img).to_rgba8())
                .ok_or_else(|| ReelcamError::overlay(format!("Frame {} has a short RGB buffer", self.id))),
            FrameFormat::Rgba32 => RgbaImage::from_raw(self.width, self.height, data)
                .ok_or_else(|| ReelcamError::overlay(format!("Frame {} has a short RGBA buffer", self.id))),
        }
    }
}

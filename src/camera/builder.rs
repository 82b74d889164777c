use crate::camera::mock::MockCameraSource;
use crate::camera::source::CameraSource;
use crate::config::{CameraBackend, CameraConfig};
use crate::error::{ReelcamError, Result};
use std::sync::Arc;
use tracing::info;

/// Builds the camera source selected by configuration
pub struct CameraSourceBuilder {
    config: Option<CameraConfig>,
}

impl CameraSourceBuilder {
    pub fn new() -> Self {
        Self { config: None }
    }

    pub fn config(mut self, config: CameraConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<Arc<dyn CameraSource>> {
        let config = self
            .config
            .ok_or_else(|| ReelcamError::system("Camera configuration must be specified"))?;

        info!(
            "Using {:?} camera backend (device {}, {}x{} @ {}fps)",
            config.backend, config.index, config.resolution.0, config.resolution.1, config.fps
        );

        match config.backend {
            CameraBackend::Mock => Ok(Arc::new(MockCameraSource::new())),
            #[cfg(all(target_os = "linux", feature = "camera"))]
            CameraBackend::V4l2 => Ok(Arc::new(super::v4l2::V4l2CameraSource::new()?)),
            #[cfg(not(all(target_os = "linux", feature = "camera")))]
            CameraBackend::V4l2 => Err(crate::error::CameraError::NotAvailable.into()),
        }
    }
}

impl Default for CameraSourceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

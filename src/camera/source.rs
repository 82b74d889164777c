use crate::camera::stream::MediaStream;
use crate::config::CameraConfig;
use crate::error::CameraError;
use async_trait::async_trait;

/// Camera capability: request access and receive a live stream, or a failure.
///
/// Permission denial is reported as [`CameraError::PermissionDenied`].
#[async_trait]
pub trait CameraSource: Send + Sync {
    async fn open(&self, config: &CameraConfig) -> Result<MediaStream, CameraError>;

    fn name(&self) -> &str;
}

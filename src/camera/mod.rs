mod builder;
mod mock;
mod source;
mod stream;
#[cfg(all(target_os = "linux", feature = "camera"))]
mod v4l2;

pub use builder::CameraSourceBuilder;
pub use mock::MockCameraSource;
pub use source::CameraSource;
pub use stream::{MediaStream, MediaTrack};
#[cfg(all(target_os = "linux", feature = "camera"))]
pub use v4l2::V4l2CameraSource;

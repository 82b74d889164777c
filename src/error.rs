use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReelcamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Feed source error: {0}")]
    FeedSource(#[from] serde_json::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Detector error: {0}")]
    Detector(#[from] DetectorError),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("Share error: {0}")]
    Share(#[from] ShareError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Overlay error: {details}")]
    Overlay { details: String },

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl ReelcamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>, M: Into<String>>(component: S, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn overlay<S: Into<String>>(details: S) -> Self {
        Self::Overlay {
            details: details.into(),
        }
    }
}

/// Shown for every camera-view initialization failure other than a permission denial
pub const INIT_FAILURE_MESSAGE: &str = "Failed to initialize AI camera.";

/// Camera acquisition and capture failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CameraError {
    #[error("Camera permission denied")]
    PermissionDenied,

    #[error("Failed to open camera device {device}: {details}")]
    DeviceOpen { device: String, details: String },

    #[error("Camera configuration error: {details}")]
    Configuration { details: String },

    #[error("Capture stream error: {details}")]
    CaptureStream { details: String },

    #[error("Camera not available on this system")]
    NotAvailable,
}

impl CameraError {
    /// Permission denial is reported separately from every other init failure
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, CameraError::PermissionDenied)
    }

    pub fn user_message(&self) -> String {
        match self {
            CameraError::PermissionDenied => {
                "Camera permission denied. Please enable camera access in your settings."
                    .to_string()
            }
            _ => INIT_FAILURE_MESSAGE.to_string(),
        }
    }
}

/// Failures from the opaque detector capability
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectorError {
    #[error("Failed to load detection model '{model}': {details}")]
    ModelLoad { model: String, details: String },

    #[error("Detection failed on frame {frame_id}: {details}")]
    Inference { frame_id: u64, details: String },
}

/// Media playback failures reported by a player
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    /// Unmuted automatic playback refused by platform policy
    #[error("Playback blocked by autoplay restriction")]
    AutoplayBlocked,

    #[error("Media error: {details}")]
    Media { details: String },
}

impl PlaybackError {
    pub fn is_autoplay_restriction(&self) -> bool {
        matches!(self, PlaybackError::AutoplayBlocked)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShareError {
    #[error("Share capability not available")]
    Unavailable,

    #[error("Share rejected: {details}")]
    Rejected { details: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Event receiver lagged behind by {count} events")]
    Lagged { count: u64 },

    #[error("Event channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, ReelcamError>;

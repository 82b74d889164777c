pub mod app;
pub mod camera;
pub mod camera_view;
pub mod config;
pub mod detection;
pub mod error;
pub mod events;
pub mod feed;
pub mod frame;
pub mod keyboard_input;
pub mod player;

pub use app::{ComponentState, ReelcamOrchestrator, RunMode, ShutdownReason};
pub use camera::{CameraSource, CameraSourceBuilder, MediaStream, MediaTrack, MockCameraSource};
pub use camera_view::{CameraView, CameraViewStatus, TeardownReason, TeardownReport};
pub use config::ReelcamConfig;
pub use detection::{
    AlertLatch, BoundingBox, Detection, DetectionLoop, Detector, DetectorLoader, PredictionStore,
    Predictions, ScriptedDetector, ScriptedLoader,
};
pub use error::{ReelcamError, Result};
pub use events::{EventBus, EventFilter, EventReceiver, ReelcamEvent};
pub use feed::{ActiveItemReader, FeedController, PlaybackPolicy, VideoItem, VisibilityReport};
pub use frame::{FrameData, FrameFormat};
pub use keyboard_input::{HostCommand, KeyboardInputHandler};
pub use player::{
    AutoplayGate, Interaction, ItemHandle, MediaPlayer, PerItemPlaybackState, PlaybackState,
    ScriptedPlayer, ShareTarget, VideoItemController,
};

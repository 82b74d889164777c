use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ReelcamConfig {
    pub feed: FeedConfig,
    pub playback: PlaybackConfig,
    pub camera: CameraConfig,
    pub detection: DetectionConfig,
    pub screenshot: ScreenshotConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FeedConfig {
    /// Optional JSON file with the feed items; the built-in catalogue is used when absent
    pub source: Option<String>,

    /// Fraction of an item that must be visible for it to become active
    #[serde(default = "default_visibility_threshold")]
    pub visibility_threshold: f64,

    /// Margin applied around the scroll viewport, in pixels
    #[serde(default = "default_root_margin")]
    pub root_margin: f64,

    /// Delay before measuring the first item after mount, in milliseconds
    #[serde(default = "default_initial_check_delay_ms")]
    pub initial_check_delay_ms: u64,

    /// Rule used when several reports qualify in one batch
    #[serde(default)]
    pub tie_break: TieBreak,

    /// What happens when the active item leaves the viewport and nothing else qualifies
    #[serde(default)]
    pub exit_policy: ExitPolicy,

    /// Height of the simulated scroll viewport (and of every item), in pixels
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PlaybackConfig {
    /// Restart media at end of stream
    #[serde(default = "default_loop_playback")]
    pub loop_playback: bool,

    /// Initial per-item mute preference
    #[serde(default = "default_start_muted")]
    pub start_muted: bool,

    /// Simulate the platform autoplay restriction in the terminal host
    #[serde(default = "default_simulate_autoplay_restriction")]
    pub simulate_autoplay_restriction: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Camera device index (e.g., 0 for /dev/video0)
    #[serde(default = "default_camera_index")]
    pub index: u32,

    /// Camera resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Frames per second
    #[serde(default = "default_camera_fps")]
    pub fps: u32,

    /// Preferred facing mode
    #[serde(default)]
    pub facing: CameraFacing,

    /// Frame source backend
    #[serde(default)]
    pub backend: CameraBackend,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DetectionConfig {
    /// Name of the pre-trained model to load
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Label that raises the alert when it appears
    #[serde(default = "default_alert_label")]
    pub alert_label: String,

    /// Minimum confidence for a detection to count towards the alert
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,

    /// Upper bound on detector invocations per second (display refresh rate)
    #[serde(default = "default_refresh_hz")]
    pub refresh_hz: u32,

    /// Vibration requested when the alert is raised, in milliseconds
    #[serde(default = "default_alert_vibrate_ms")]
    pub alert_vibrate_ms: u64,

    /// How long the alert toast stays up
    #[serde(default = "default_alert_toast_seconds")]
    pub alert_toast_seconds: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScreenshotConfig {
    /// Directory where screenshots are written
    #[serde(default = "default_screenshot_path")]
    pub path: String,

    /// Base file name; a timestamp is inserted before the extension
    #[serde(default = "default_screenshot_file_name")]
    pub file_name: String,

    /// TrueType font used for box labels
    #[serde(default = "default_font_path")]
    pub font_path: String,

    /// Label font size on the live overlay
    #[serde(default = "default_live_font_size")]
    pub live_font_size: f32,

    /// Label font size on saved screenshots
    #[serde(default = "default_capture_font_size")]
    pub capture_font_size: f32,

    /// Box stroke width on the live overlay
    #[serde(default = "default_live_line_width")]
    pub live_line_width: u32,

    /// Box stroke width on saved screenshots
    #[serde(default = "default_capture_line_width")]
    pub capture_line_width: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Highest visibility ratio wins; equal ratios go to the later report
    #[default]
    HighestRatio,
    /// Last qualifying report in batch order wins
    LastQualifying,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExitPolicy {
    /// Keep the last active item until another qualifies
    #[default]
    KeepLast,
    /// Clear the active item once it stops intersecting
    Clear,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CameraFacing {
    #[default]
    Environment,
    User,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CameraBackend {
    /// Synthetic frames, no hardware required
    #[default]
    Mock,
    /// V4L2 device through GStreamer (requires the `camera` feature)
    V4l2,
}

impl ReelcamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("reelcam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("feed.visibility_threshold", default_visibility_threshold())?
            .set_default("feed.root_margin", default_root_margin())?
            .set_default(
                "feed.initial_check_delay_ms",
                default_initial_check_delay_ms(),
            )?
            .set_default("feed.tie_break", "highest_ratio")?
            .set_default("feed.exit_policy", "keep_last")?
            .set_default("feed.viewport_height", default_viewport_height())?
            .set_default("playback.loop_playback", default_loop_playback())?
            .set_default("playback.start_muted", default_start_muted())?
            .set_default(
                "playback.simulate_autoplay_restriction",
                default_simulate_autoplay_restriction(),
            )?
            .set_default("camera.index", default_camera_index())?
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.fps", default_camera_fps())?
            .set_default("camera.facing", "environment")?
            .set_default("camera.backend", "mock")?
            .set_default("detection.model_name", default_model_name())?
            .set_default("detection.alert_label", default_alert_label())?
            .set_default("detection.min_confidence", default_min_confidence() as f64)?
            .set_default("detection.refresh_hz", default_refresh_hz())?
            .set_default("detection.alert_vibrate_ms", default_alert_vibrate_ms())?
            .set_default(
                "detection.alert_toast_seconds",
                default_alert_toast_seconds(),
            )?
            .set_default("screenshot.path", default_screenshot_path())?
            .set_default("screenshot.file_name", default_screenshot_file_name())?
            .set_default("screenshot.font_path", default_font_path())?
            .set_default(
                "screenshot.live_font_size",
                default_live_font_size() as f64,
            )?
            .set_default(
                "screenshot.capture_font_size",
                default_capture_font_size() as f64,
            )?
            .set_default("screenshot.live_line_width", default_live_line_width())?
            .set_default(
                "screenshot.capture_line_width",
                default_capture_line_width(),
            )?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // REELCAM_FEED__VIEWPORT_HEIGHT=600 -> feed.viewport_height
            .add_source(
                Environment::with_prefix("REELCAM")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: ReelcamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.feed.visibility_threshold > 0.0 && self.feed.visibility_threshold <= 1.0) {
            return Err(ConfigError::Message(
                "Feed visibility_threshold must be in (0, 1]".to_string(),
            ));
        }

        if self.feed.root_margin < 0.0 {
            return Err(ConfigError::Message(
                "Feed root_margin must not be negative".to_string(),
            ));
        }

        if self.feed.viewport_height == 0 {
            return Err(ConfigError::Message(
                "Feed viewport_height must be greater than 0".to_string(),
            ));
        }

        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.fps == 0 {
            return Err(ConfigError::Message(
                "Camera fps must be greater than 0".to_string(),
            ));
        }

        if self.detection.refresh_hz == 0 {
            return Err(ConfigError::Message(
                "Detection refresh_hz must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.detection.min_confidence) {
            return Err(ConfigError::Message(
                "Detection min_confidence must be in [0, 1]".to_string(),
            ));
        }

        if self.detection.alert_label.trim().is_empty() {
            return Err(ConfigError::Message(
                "Detection alert_label must not be empty".to_string(),
            ));
        }

        if self.screenshot.live_line_width == 0 || self.screenshot.capture_line_width == 0 {
            return Err(ConfigError::Message(
                "Screenshot line widths must be greater than 0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for ReelcamConfig {
    fn default() -> Self {
        Self {
            feed: FeedConfig {
                source: None,
                visibility_threshold: default_visibility_threshold(),
                root_margin: default_root_margin(),
                initial_check_delay_ms: default_initial_check_delay_ms(),
                tie_break: TieBreak::default(),
                exit_policy: ExitPolicy::default(),
                viewport_height: default_viewport_height(),
            },
            playback: PlaybackConfig {
                loop_playback: default_loop_playback(),
                start_muted: default_start_muted(),
                simulate_autoplay_restriction: default_simulate_autoplay_restriction(),
            },
            camera: CameraConfig {
                index: default_camera_index(),
                resolution: default_camera_resolution(),
                fps: default_camera_fps(),
                facing: CameraFacing::default(),
                backend: CameraBackend::default(),
            },
            detection: DetectionConfig {
                model_name: default_model_name(),
                alert_label: default_alert_label(),
                min_confidence: default_min_confidence(),
                refresh_hz: default_refresh_hz(),
                alert_vibrate_ms: default_alert_vibrate_ms(),
                alert_toast_seconds: default_alert_toast_seconds(),
            },
            screenshot: ScreenshotConfig {
                path: default_screenshot_path(),
                file_name: default_screenshot_file_name(),
                font_path: default_font_path(),
                live_font_size: default_live_font_size(),
                capture_font_size: default_capture_font_size(),
                live_line_width: default_live_line_width(),
                capture_line_width: default_capture_line_width(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
fn default_visibility_threshold() -> f64 {
    0.5
}
fn default_root_margin() -> f64 {
    0.0
}
fn default_initial_check_delay_ms() -> u64 {
    100
}
fn default_viewport_height() -> u32 {
    800
}

fn default_loop_playback() -> bool {
    true
}
fn default_start_muted() -> bool {
    false
}
fn default_simulate_autoplay_restriction() -> bool {
    true
}

fn default_camera_index() -> u32 {
    0
}
fn default_camera_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_camera_fps() -> u32 {
    30
}

fn default_model_name() -> String {
    "coco-ssd".to_string()
}
fn default_alert_label() -> String {
    "person".to_string()
}
fn default_min_confidence() -> f32 {
    0.0
}
fn default_refresh_hz() -> u32 {
    60
}
fn default_alert_vibrate_ms() -> u64 {
    1000
}
fn default_alert_toast_seconds() -> u32 {
    3
}

fn default_screenshot_path() -> String {
    "./screenshots".to_string()
}
fn default_screenshot_file_name() -> String {
    "ai-camera-snapshot.jpg".to_string()
}
fn default_font_path() -> String {
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string()
}
fn default_live_font_size() -> f32 {
    16.0
}
fn default_capture_font_size() -> f32 {
    18.0
}
fn default_live_line_width() -> u32 {
    2
}
fn default_capture_line_width() -> u32 {
    3
}

fn default_event_bus_capacity() -> usize {
    100
}

use super::types::{ComponentState, RunMode, ShutdownReason};
use crate::camera::{CameraSource, CameraSourceBuilder};
use crate::camera_view::{CameraView, TeardownReport};
use crate::config::ReelcamConfig;
use crate::detection::{ScriptedDetector, ScriptedLoader};
use crate::error::Result;
use crate::events::EventBus;
use crate::feed::{load_feed, FeedController};
use crate::keyboard_input::{HostCommand, KeyboardInputHandler};
use crate::player::{AutoplayGate, ItemHandle, PerItemPlaybackState, ShareTarget};
use std::collections::HashMap;
use std::io::IsTerminal;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::info;

const COMMAND_QUEUE_DEPTH: usize = 32;

/// Wires the feed or the camera view to terminal input and manages their lifecycle
pub struct ReelcamOrchestrator {
    pub(super) config: ReelcamConfig,
    pub(super) mode: RunMode,
    pub(super) event_bus: Arc<EventBus>,

    // Feed mode
    pub(super) feed: Option<FeedController>,
    pub(super) item_handles: Vec<ItemHandle>,
    pub(super) autoplay_gate: AutoplayGate,
    pub(super) share_target: Option<Arc<dyn ShareTarget>>,
    pub(super) hovering: bool,

    // Camera mode
    pub(super) camera_view: Option<CameraView>,
    pub(super) detector: Option<ScriptedDetector>,
    pub(super) teardown_report: Option<TeardownReport>,

    // Input
    pub(super) keyboard_handler: Option<KeyboardInputHandler>,
    pub(super) keyboard_enabled: bool,
    pub(super) command_sender: mpsc::Sender<HostCommand>,
    pub(super) command_receiver: Option<mpsc::Receiver<HostCommand>>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl ReelcamOrchestrator {
    /// Create an orchestrator; camera mode opens the source named by the configuration
    pub async fn new(config: ReelcamConfig, mode: RunMode) -> Result<Self> {
        match mode {
            RunMode::Feed => Self::build(config, mode, None),
            RunMode::Camera => {
                let source = CameraSourceBuilder::new().config(config.camera.clone()).build()?;
                Self::build(config, mode, Some(source))
            }
        }
    }

    /// Camera mode over an explicit camera source
    pub async fn with_camera_source(config: ReelcamConfig, source: Arc<dyn CameraSource>) -> Result<Self> {
        Self::build(config, RunMode::Camera, Some(source))
    }

    fn build(config: ReelcamConfig, mode: RunMode, source: Option<Arc<dyn CameraSource>>) -> Result<Self> {
        let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();
        let (command_sender, command_receiver) = mpsc::channel(COMMAND_QUEUE_DEPTH);

        let feed = match mode {
            RunMode::Feed => {
                let items = load_feed(&config.feed)?;
                Some(FeedController::new(items, config.feed.clone(), Arc::clone(&event_bus))?)
            }
            RunMode::Camera => None,
        };

        let (camera_view, detector) = match source {
            Some(source) => {
                let detector = ScriptedDetector::new(config.detection.model_name.clone());
                let loader = Arc::new(ScriptedLoader::new(detector.clone()));
                let view = CameraView::new(config.clone(), source, loader, Arc::clone(&event_bus));
                (Some(view), Some(detector))
            }
            None => (None, None),
        };

        let keyboard_enabled = std::io::stdin().is_terminal();
        info!("Created {:?} orchestrator (keyboard input: {})", mode, keyboard_enabled);

        Ok(Self {
            config,
            mode,
            event_bus,
            feed,
            item_handles: Vec::new(),
            autoplay_gate: AutoplayGate::new(),
            share_target: None,
            hovering: false,
            camera_view,
            detector,
            teardown_report: None,
            keyboard_handler: None,
            keyboard_enabled,
            command_sender,
            command_receiver: Some(command_receiver),
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Platform share capability handed to every feed item; without one sharing is a no-op
    pub fn with_share_target(mut self, target: Arc<dyn ShareTarget>) -> Self {
        self.share_target = Some(target);
        self
    }

    pub fn set_keyboard_enabled(&mut self, enabled: bool) {
        self.keyboard_enabled = enabled;
    }

    pub fn config(&self) -> &ReelcamConfig {
        &self.config
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    /// Inject host commands as if typed
    pub fn command_sender(&self) -> mpsc::Sender<HostCommand> {
        self.command_sender.clone()
    }

    pub fn feed(&self) -> Option<&FeedController> {
        self.feed.as_ref()
    }

    pub fn camera_view(&self) -> Option<&CameraView> {
        self.camera_view.as_ref()
    }

    pub fn item_states(&self) -> Vec<PerItemPlaybackState> {
        self.item_handles.iter().map(|handle| handle.state()).collect()
    }

    /// What the last camera teardown released
    pub fn teardown_report(&self) -> Option<&TeardownReport> {
        self.teardown_report.as_ref()
    }
}

use super::{ComponentState, ReelcamOrchestrator, RunMode};
use crate::error::{EventBusError, ReelcamError, Result};
use crate::events::{EventFilter, ReelcamEvent};
use crate::keyboard_input::KeyboardInputHandler;
use crate::player::{spawn_item_controller, ScriptedPlayer, VideoItemController};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

impl ReelcamOrchestrator {
    /// Register every component of the run mode as stopped
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing {:?} components", self.mode);

        for component in self.components() {
            self.set_component_state(component, ComponentState::Stopped).await;
        }

        if let Some(feed) = &self.feed {
            info!("Feed holds {} items", feed.items().len());
        }
        if let Some(view) = &self.camera_view {
            info!(
                "Camera view session {} ready to mount (model: {})",
                view.session_id(),
                self.config.detection.model_name
            );
        }

        Ok(())
    }

    /// Start the run mode's components, then keyboard input
    pub async fn start(&mut self) -> Result<()> {
        self.spawn_event_reporter();

        match self.mode {
            RunMode::Feed => self.start_feed().await?,
            RunMode::Camera => self.start_camera().await?,
        }

        if self.keyboard_enabled {
            self.start_keyboard().await?;
        }

        info!("All components started");
        Ok(())
    }

    async fn start_feed(&mut self) -> Result<()> {
        self.set_component_state("feed", ComponentState::Starting).await;

        let feed = self
            .feed
            .as_mut()
            .ok_or_else(|| ReelcamError::component("feed", "Feed mode without a feed"))?;
        if let Err(e) = feed.mount() {
            self.set_component_state("feed", ComponentState::Failed).await;
            return Err(e);
        }
        let items = feed.items().to_vec();
        let reader = feed.subscribe();
        self.set_component_state("feed", ComponentState::Running).await;

        self.set_component_state("players", ComponentState::Starting).await;
        let restricted = self.config.playback.simulate_autoplay_restriction;
        for item in items {
            let mut player = ScriptedPlayer::new(item.id.clone());
            if restricted {
                player = player.with_gate(self.autoplay_gate.clone());
            }

            let mut controller = VideoItemController::new(
                item,
                Box::new(player),
                &self.config.playback,
                Arc::clone(&self.event_bus),
            );
            if let Some(target) = &self.share_target {
                controller = controller.with_share_target(Arc::clone(target));
            }

            self.item_handles.push(spawn_item_controller(controller, reader.clone()));
        }
        self.set_component_state("players", ComponentState::Running).await;

        info!(
            "Feed started with {} item controllers (autoplay restricted until first key: {})",
            self.item_handles.len(),
            restricted
        );
        Ok(())
    }

    async fn start_camera(&mut self) -> Result<()> {
        self.set_component_state("camera_view", ComponentState::Starting).await;

        let view = self
            .camera_view
            .as_mut()
            .ok_or_else(|| ReelcamError::component("camera_view", "Camera mode without a camera view"))?;

        match view.mount().await {
            Ok(()) => {
                let (width, height) = view.frame_size();
                info!("Camera streaming at {}x{}; press p to toggle a person, c to capture", width, height);
                self.set_component_state("camera_view", ComponentState::Running).await;
                Ok(())
            }
            Err(e) => {
                if let Some(message) = view.status().message() {
                    error!("{}", message);
                }
                self.set_component_state("camera_view", ComponentState::Failed).await;
                Err(e)
            }
        }
    }

    async fn start_keyboard(&mut self) -> Result<()> {
        self.set_component_state("keyboard", ComponentState::Starting).await;

        let handler = KeyboardInputHandler::new(self.command_sender.clone());
        match handler.start().await {
            Ok(()) => {
                self.keyboard_handler = Some(handler);
                self.set_component_state("keyboard", ComponentState::Running).await;
                Ok(())
            }
            Err(e) => {
                self.set_component_state("keyboard", ComponentState::Failed).await;
                Err(e)
            }
        }
    }

    /// Log user-facing notifications until shutdown
    fn spawn_event_reporter(&self) {
        let mut events = self.event_bus.subscribe_filtered(
            EventFilter::EventTypes(vec![
                "alert_raised",
                "alert_cleared",
                "video_liked",
                "video_shared",
                "screenshot_saved",
                "system_error",
            ]),
            "host_reporter",
        );
        let cancelled = self.cancellation_token.clone();

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancelled.cancelled() => break,
                    event = events.recv() => event,
                };

                match event {
                    Ok(ReelcamEvent::AlertRaised {
                        label,
                        vibrate_ms,
                        toast_seconds,
                        ..
                    }) => warn!(
                        "{} detected! (vibrate {}ms, notice for {}s)",
                        label, vibrate_ms, toast_seconds
                    ),
                    Ok(ReelcamEvent::AlertCleared { label, .. }) => info!("No {} in view", label),
                    Ok(ReelcamEvent::VideoLiked { item_id }) => info!("Liked video {}", item_id),
                    Ok(ReelcamEvent::VideoShared { item_id, delivered }) => {
                        if delivered {
                            info!("Shared video {}", item_id);
                        } else {
                            info!("Sharing is not available here ({})", item_id);
                        }
                    }
                    Ok(ReelcamEvent::ScreenshotSaved { path }) => info!("Screenshot saved to {}", path),
                    Ok(ReelcamEvent::SystemError { component, error }) => {
                        error!("{} error: {}", component, error)
                    }
                    Ok(other) => debug!("Ignoring event: {}", other.description()),
                    Err(EventBusError::Lagged { count }) => {
                        debug!("Event reporter skipped {} events", count)
                    }
                    Err(e) => {
                        debug!("Event reporter stopping: {}", e);
                        break;
                    }
                }
            }
        });
    }
}

use super::{ReelcamOrchestrator, RunMode, ShutdownReason};
use crate::camera_view::CameraViewStatus;
use crate::error::{ReelcamError, Result};
use crate::events::ReelcamEvent;
use crate::keyboard_input::HostCommand;
use crate::player::Interaction;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::signal;
use tokio::sync::{oneshot, watch, Mutex};
use tracing::{debug, error, info, warn};

impl ReelcamOrchestrator {
    /// Dispatch host commands until quit, a signal, or the camera session ends
    pub async fn run(&mut self) -> Result<i32> {
        info!("Reelcam is running in {:?} mode", self.mode);

        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| ReelcamError::system("Shutdown sender already taken"))?;
        let mut shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| ReelcamError::system("Shutdown receiver already taken"))?;
        let mut commands = self
            .command_receiver
            .take()
            .ok_or_else(|| ReelcamError::system("Command receiver already taken"))?;

        self.setup_signal_handlers(shutdown_sender);

        let mut camera_status = self.camera_view.as_ref().map(|view| view.watch_status());
        if self.mode == RunMode::Feed {
            info!("{}", self.status_line());
        }

        let reason = loop {
            tokio::select! {
                reason = &mut shutdown_receiver => {
                    break reason.map_err(|_| ReelcamError::system("Shutdown channel closed unexpectedly"))?;
                }
                Some(command) = commands.recv() => {
                    if command == HostCommand::Quit {
                        info!("Quit requested");
                        break ShutdownReason::UserRequest;
                    }
                    self.handle_command(command).await;
                }
                status = next_status(&mut camera_status) => {
                    if status == CameraViewStatus::Closed {
                        break ShutdownReason::Error("Camera stream ended".to_string());
                    }
                    debug!("Camera view status: {:?}", status);
                }
            }
        };

        info!("Shutdown initiated: {:?}", reason);
        if let Err(e) = self.event_bus.publish(ReelcamEvent::ShutdownRequested {
            timestamp: SystemTime::now(),
            reason: format!("{:?}", reason),
        }) {
            debug!("No listeners for shutdown event: {}", e);
        }

        let exit_code = self.shutdown().await?.max(reason.exit_code());

        info!("Reelcam shutdown complete");
        Ok(exit_code)
    }

    /// Apply one host command to the active surface
    pub(super) async fn handle_command(&mut self, command: HostCommand) {
        // Any key press counts as a user gesture
        self.autoplay_gate.grant();

        match (self.mode, command) {
            (_, HostCommand::Quit) => {}
            (RunMode::Feed, HostCommand::ScrollUp) => self.scroll(-1),
            (RunMode::Feed, HostCommand::ScrollDown) => self.scroll(1),
            (RunMode::Feed, HostCommand::TapSurface) => self.interact(Interaction::SurfaceTap).await,
            (RunMode::Feed, HostCommand::ToggleMute) => self.interact(Interaction::MuteTap).await,
            (RunMode::Feed, HostCommand::Like) => self.interact(Interaction::LikeTap).await,
            (RunMode::Feed, HostCommand::Share) => self.interact(Interaction::ShareTap).await,
            (RunMode::Feed, HostCommand::ToggleHover) => {
                self.hovering = !self.hovering;
                let interaction = if self.hovering {
                    Interaction::HoverEnter
                } else {
                    Interaction::HoverLeave
                };
                self.interact(interaction).await;
            }
            (RunMode::Camera, HostCommand::Screenshot) => self.capture().await,
            (RunMode::Camera, HostCommand::TogglePerson) => self.toggle_person(),
            (mode, command) => debug!("{:?} has no meaning in {:?} mode", command, mode),
        }
    }

    fn scroll(&mut self, delta: i64) {
        if let Some(feed) = &self.feed {
            feed.scroll_by(delta);
        }
        // Hover belongs to the item that was under the pointer
        self.hovering = false;
        info!("{}", self.status_line());
    }

    /// Forward a tap to the item filling the viewport
    async fn interact(&mut self, interaction: Interaction) {
        let Some(item_id) = self
            .feed
            .as_ref()
            .and_then(|feed| feed.item_in_view())
            .map(|item| item.id.clone())
        else {
            debug!("No item in view for {:?}", interaction);
            return;
        };

        match self.item_handles.iter().find(|handle| handle.item_id() == item_id) {
            Some(handle) => {
                if let Err(e) = handle.send(interaction).await {
                    warn!("Failed to deliver {:?}: {}", interaction, e);
                }
            }
            None => warn!("No controller for item {}", item_id),
        }
    }

    async fn capture(&self) {
        let Some(view) = &self.camera_view else {
            return;
        };
        if !view.can_capture() {
            info!("Nothing to capture yet");
            return;
        }
        match view.capture_screenshot().await {
            Ok(path) => debug!("Capture written to {}", path.display()),
            Err(e) => error!("Screenshot failed: {}", e),
        }
    }

    fn toggle_person(&self) {
        if let (Some(detector), Some(view)) = (&self.detector, &self.camera_view) {
            let present = detector.toggle_person(view.frame_size());
            info!("Simulated person {}", if present { "enters the frame" } else { "leaves the frame" });
        }
    }

    /// One-line rendering of the item in view
    pub fn status_line(&self) -> String {
        let Some(feed) = &self.feed else {
            return String::new();
        };
        let Some(item) = feed.item_in_view() else {
            return "(empty feed)".to_string();
        };

        let position = feed
            .items()
            .iter()
            .position(|candidate| candidate.id == item.id)
            .map(|index| index + 1)
            .unwrap_or(0);
        let caption = item.caption_lines().join(" - ");

        let playback = match self
            .item_handles
            .iter()
            .find(|handle| handle.item_id() == item.id)
            .map(|handle| handle.state())
        {
            Some(state) => format!(
                "{}{}{}",
                if state.show_play_indicator { "[>] " } else { "" },
                if state.playing { "playing" } else { "paused" },
                if state.muted { ", muted" } else { "" }
            ),
            None => "not mounted".to_string(),
        };

        format!("[{}/{}] {} ({})", position, feed.items().len(), caption, playback)
    }

    /// Set up signal handlers for graceful shutdown
    fn setup_signal_handlers(&self, shutdown_sender: oneshot::Sender<ShutdownReason>) {
        let shutdown_sender = Arc::new(Mutex::new(Some(shutdown_sender)));

        #[cfg(unix)]
        {
            let shutdown_sender_sigterm = Arc::clone(&shutdown_sender);
            tokio::spawn(async move {
                let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        warn!("Failed to register SIGTERM handler: {}", e);
                        return;
                    }
                };
                if sigterm.recv().await.is_some() {
                    info!("Received SIGTERM signal");
                    if let Some(sender) = shutdown_sender_sigterm.lock().await.take() {
                        let _ = sender.send(ShutdownReason::Signal("SIGTERM".to_string()));
                    }
                }
            });
        }

        let shutdown_sender_sigint = Arc::clone(&shutdown_sender);
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                if let Some(sender) = shutdown_sender_sigint.lock().await.take() {
                    let _ = sender.send(ShutdownReason::Signal("SIGINT".to_string()));
                }
            }
        });
    }
}

/// Next camera status change; pends forever without a camera or once the view is gone
async fn next_status(status: &mut Option<watch::Receiver<CameraViewStatus>>) -> CameraViewStatus {
    if let Some(receiver) = status {
        if receiver.changed().await.is_ok() {
            return receiver.borrow_and_update().clone();
        }
    }
    *status = None;
    std::future::pending().await
}

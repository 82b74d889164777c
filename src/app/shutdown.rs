use super::{ComponentState, ReelcamOrchestrator};
use crate::error::{ReelcamError, Result};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

const PLAYER_STOP_TIMEOUT: Duration = Duration::from_secs(5);
const CAMERA_STOP_TIMEOUT: Duration = Duration::from_secs(10);

impl ReelcamOrchestrator {
    /// Stop every component in reverse start order
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        self.cancellation_token.cancel();

        let mut exit_code = 0;
        for component in self.components().into_iter().rev() {
            if let Err(e) = self.stop_component(component).await {
                error!("Error stopping {}: {}", component, e);
                exit_code = 1;
            }
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    async fn stop_component(&mut self, component: &str) -> Result<()> {
        if self.get_component_state(component).await != Some(ComponentState::Running) {
            return Ok(());
        }

        info!("Stopping {} component", component);
        self.set_component_state(component, ComponentState::Stopping).await;

        let result = match component {
            "keyboard" => {
                if let Some(handler) = self.keyboard_handler.take() {
                    handler.stop().await;
                }
                Ok(())
            }
            "players" => {
                let handles = std::mem::take(&mut self.item_handles);
                let count = handles.len();
                let stop_all = async move {
                    for handle in handles {
                        handle.shutdown().await;
                    }
                };
                match timeout(PLAYER_STOP_TIMEOUT, stop_all).await {
                    Ok(()) => {
                        info!("Paused and released {} item controllers", count);
                        Ok(())
                    }
                    Err(_) => Err(ReelcamError::component(component, "Timed out stopping item controllers")),
                }
            }
            "feed" => {
                if let Some(feed) = self.feed.as_mut() {
                    feed.unmount();
                }
                Ok(())
            }
            "camera_view" => match self.camera_view.as_mut() {
                Some(view) => match timeout(CAMERA_STOP_TIMEOUT, view.unmount()).await {
                    Ok(report) => {
                        info!(
                            "Camera released: {} tracks stopped, detection cancelled: {}",
                            report.tracks_stopped, report.detection_cancelled
                        );
                        let complete = report.all_tracks_stopped;
                        self.teardown_report = Some(report);
                        if complete {
                            Ok(())
                        } else {
                            warn!("Camera teardown left live tracks behind");
                            Err(ReelcamError::component(component, "Media tracks still live after teardown"))
                        }
                    }
                    Err(_) => Err(ReelcamError::component(component, "Timed out releasing the camera")),
                },
                None => Ok(()),
            },
            other => {
                warn!("Unknown component: {}", other);
                Ok(())
            }
        };

        let state = if result.is_ok() {
            ComponentState::Stopped
        } else {
            ComponentState::Failed
        };
        self.set_component_state(component, state).await;
        if result.is_ok() {
            info!("{} component stopped", component);
        }
        result
    }
}

use crate::error::{ReelcamError, Result};
use crate::feed::active::ActiveItemWriter;
use crate::feed::policy::{PlaybackPolicy, VisibilityReport};
use crate::feed::viewport::{LayoutProbe, ObserverOptions, TrackerHost, VisibilityTracker};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Bridges a visibility-tracking instance to the playback policy.
///
/// Sole owner of the registration set. Dropping it releases the tracker and cancels a
/// pending initial check.
pub struct ViewportObserver {
    tracker: Box<dyn VisibilityTracker>,
    policy: PlaybackPolicy,
    writer: ActiveItemWriter,
    initial_check: Option<(CancellationToken, JoinHandle<()>)>,
    connected: bool,
}

impl ViewportObserver {
    pub(crate) fn new(
        host: &dyn TrackerHost,
        options: ObserverOptions,
        policy: PlaybackPolicy,
        writer: ActiveItemWriter,
    ) -> Self {
        let callback_writer = writer.clone();
        let tracker = host.create_tracker(
            options,
            Arc::new(move |batch: Vec<VisibilityReport>| {
                debug!("Observer received {} visibility reports", batch.len());
                callback_writer.apply(&policy, &batch);
            }),
        );

        Self {
            tracker,
            policy,
            writer,
            initial_check: None,
            connected: true,
        }
    }

    pub fn observe(&mut self, item_id: &str) {
        if self.connected {
            self.tracker.register(item_id);
        }
    }

    pub fn unobserve(&mut self, item_id: &str) {
        self.tracker.unregister(item_id);
    }

    pub fn observed(&self) -> Vec<String> {
        self.tracker.registered()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Measure `item_id` once after `delay`, since registering does not report content
    /// already in view. Must be called from within a Tokio runtime.
    pub fn schedule_initial_check(
        &mut self,
        item_id: String,
        probe: Arc<dyn LayoutProbe>,
        delay: Duration,
    ) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| ReelcamError::system("Initial visibility check requires a Tokio runtime"))?;

        self.cancel_initial_check();

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let writer = self.writer.clone();
        let policy = self.policy;

        let task = runtime.spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {
                    debug!("Initial visibility check cancelled");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            match measure_visibility(probe.as_ref(), &item_id) {
                Some(report) if policy.qualifies(&report) => {
                    info!(
                        "Initial check: item {} is {:.0}% visible",
                        item_id,
                        report.ratio * 100.0
                    );
                    writer.apply(&policy, &[report]);
                }
                Some(report) => {
                    debug!(
                        "Initial check: item {} only {:.0}% visible",
                        item_id,
                        report.ratio * 100.0
                    );
                }
                None => debug!("Initial check: item {} has no layout", item_id),
            }
        });

        self.initial_check = Some((token, task));
        Ok(())
    }

    fn cancel_initial_check(&mut self) {
        if let Some((token, task)) = self.initial_check.take() {
            token.cancel();
            task.abort();
        }
    }

    /// Unregister every container and release the tracking instance
    pub fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        self.cancel_initial_check();
        for item_id in self.tracker.registered() {
            self.tracker.unregister(&item_id);
        }
        self.tracker.disconnect();
        self.connected = false;
        debug!("Viewport observer disconnected");
    }
}

impl Drop for ViewportObserver {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Visible fraction of a container, measured directly from layout
pub fn measure_visibility(probe: &dyn LayoutProbe, item_id: &str) -> Option<VisibilityReport> {
    let rect = probe.bounding_rect(item_id)?;
    let height = rect.height();
    if height <= 0.0 {
        return None;
    }
    let viewport_height = probe.viewport_height();
    let visible = (rect.bottom.min(viewport_height) - rect.top.max(0.0)).max(0.0);
    Some(VisibilityReport::new(
        item_id,
        visible > 0.0,
        (visible / height).clamp(0.0, 1.0),
    ))
}

use crate::error::{ReelcamError, Result};
use crate::feed::ActiveItemReader;
use crate::player::controller::{Interaction, PerItemPlaybackState, VideoItemController};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const COMMAND_QUEUE_DEPTH: usize = 16;

/// Handle on a running item controller task
pub struct ItemHandle {
    item_id: String,
    commands: mpsc::Sender<Interaction>,
    state: watch::Receiver<PerItemPlaybackState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ItemHandle {
    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub async fn send(&self, interaction: Interaction) -> Result<()> {
        self.commands.send(interaction).await.map_err(|_| {
            ReelcamError::component(
                "item_controller",
                format!("Item {} is no longer running", self.item_id),
            )
        })
    }

    pub fn state(&self) -> PerItemPlaybackState {
        self.state.borrow().clone()
    }

    /// Watch state snapshots published after every transition
    pub fn watch_state(&self) -> watch::Receiver<PerItemPlaybackState> {
        self.state.clone()
    }

    /// Stop the task; the item is paused before this returns
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!("Item task for {} ended abnormally: {}", self.item_id, e);
                }
            }
        }
    }
}

impl Drop for ItemHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Run `controller` on its own task, following the feed's active item through `active`.
///
/// The reader is the task's only view of the feed; it never writes the active item.
pub fn spawn_item_controller(
    mut controller: VideoItemController,
    mut active: ActiveItemReader,
) -> ItemHandle {
    let item_id = controller.item().id.clone();
    let (command_tx, mut command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
    let (state_tx, state_rx) = watch::channel(controller.snapshot());
    let cancel = CancellationToken::new();
    let cancelled = cancel.clone();
    let task_item_id = item_id.clone();

    let task = tokio::spawn(async move {
        debug!("Item task for {} started", task_item_id);

        let initially_active = active.current_and_mark_seen().as_deref() == Some(task_item_id.as_str());
        controller.set_active(initially_active).await;
        state_tx.send_replace(controller.snapshot());

        loop {
            tokio::select! {
                biased;

                _ = cancelled.cancelled() => break,

                changed = active.changed() => {
                    if changed.is_err() {
                        info!("Feed dropped, stopping item task for {}", task_item_id);
                        break;
                    }
                    let is_active =
                        active.current_and_mark_seen().as_deref() == Some(task_item_id.as_str());
                    controller.set_active(is_active).await;
                }

                command = command_rx.recv() => match command {
                    Some(interaction) => controller.handle(interaction).await,
                    None => break,
                },
            }

            state_tx.send_replace(controller.snapshot());
        }

        controller.unmount();
        state_tx.send_replace(controller.snapshot());
        debug!("Item task for {} ended", task_item_id);
    });

    ItemHandle {
        item_id,
        commands: command_tx,
        state: state_rx,
        cancel,
        task: Some(task),
    }
}

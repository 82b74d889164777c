use crate::config::PlaybackConfig;
use crate::events::{EventBus, ReelcamEvent};
use crate::feed::VideoItem;
use crate::player::media::MediaPlayer;
use crate::player::share::{ShareRequest, ShareTarget, DEFAULT_SHARE_TITLE};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-item playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Paused,
    Playing,
    /// Playing with sound forced off by the autoplay fallback
    PlayingMuted,
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        !matches!(self, PlaybackState::Paused)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerItemPlaybackState {
    pub item_id: String,
    pub muted: bool,
    pub playing: bool,
    pub state: PlaybackState,
    pub is_active: bool,
    pub show_play_indicator: bool,
}

/// User input on an item. Control taps are consumed by their control and never
/// reach the media surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    SurfaceTap,
    MuteTap,
    LikeTap,
    ShareTap,
    HoverEnter,
    HoverLeave,
}

/// Play/pause/mute lifecycle of one feed item, driven by its `is_active` flag
pub struct VideoItemController {
    item: VideoItem,
    player: Box<dyn MediaPlayer>,
    share_target: Option<Arc<dyn ShareTarget>>,
    event_bus: Arc<EventBus>,
    state: PlaybackState,
    muted: bool,
    /// Set when `muted` was forced by the autoplay fallback rather than chosen
    muted_by_fallback: bool,
    is_active: bool,
    hovered: bool,
}

impl VideoItemController {
    pub fn new(
        item: VideoItem,
        mut player: Box<dyn MediaPlayer>,
        config: &PlaybackConfig,
        event_bus: Arc<EventBus>,
    ) -> Self {
        player.set_loop(config.loop_playback);
        player.set_muted(config.start_muted);
        debug!(
            "Mounted item controller for {} (loop: {}, muted: {})",
            item.id, config.loop_playback, config.start_muted
        );

        Self {
            item,
            player,
            share_target: None,
            event_bus,
            state: PlaybackState::Paused,
            muted: config.start_muted,
            muted_by_fallback: false,
            is_active: false,
            hovered: false,
        }
    }

    pub fn with_share_target(mut self, target: Arc<dyn ShareTarget>) -> Self {
        self.share_target = Some(target);
        self
    }

    pub fn item(&self) -> &VideoItem {
        &self.item
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn shows_play_indicator(&self) -> bool {
        self.hovered && !self.state.is_playing()
    }

    pub fn snapshot(&self) -> PerItemPlaybackState {
        PerItemPlaybackState {
            item_id: self.item.id.clone(),
            muted: self.muted,
            playing: self.state.is_playing(),
            state: self.state,
            is_active: self.is_active,
            show_play_indicator: self.shows_play_indicator(),
        }
    }

    /// Apply a change of the `is_active` flag. Repeating the current value does nothing.
    pub async fn set_active(&mut self, active: bool) -> PlaybackState {
        if active == self.is_active {
            return self.state;
        }
        self.is_active = active;

        if active {
            if !self.state.is_playing() {
                self.autoplay().await;
            }
        } else {
            self.player.pause();
            self.set_state(PlaybackState::Paused);
        }

        self.state
    }

    /// Play with the current mute preference; on an autoplay restriction retry once muted
    async fn autoplay(&mut self) {
        self.player.set_muted(self.muted);

        match self.player.play().await {
            Ok(()) => {
                self.set_state(self.playing_state());
            }
            Err(e) if e.is_autoplay_restriction() && !self.muted => {
                info!(
                    "Autoplay restricted for {}, retrying muted",
                    self.item.id
                );
                self.muted = true;
                self.player.set_muted(true);

                match self.player.play().await {
                    Ok(()) => {
                        self.muted_by_fallback = true;
                        self.set_state(PlaybackState::PlayingMuted);
                    }
                    Err(e) => {
                        warn!("Muted autoplay failed for {}: {}", self.item.id, e);
                        self.set_state(PlaybackState::Paused);
                    }
                }
            }
            Err(e) => {
                warn!("Autoplay failed for {}: {}", self.item.id, e);
                self.set_state(PlaybackState::Paused);
            }
        }
    }

    /// Manual play/pause toggle; leaves `muted` and the feed's active item untouched
    pub async fn tap(&mut self) -> PlaybackState {
        if self.state.is_playing() {
            self.player.pause();
            self.set_state(PlaybackState::Paused);
        } else {
            match self.player.play().await {
                Ok(()) => self.set_state(self.playing_state()),
                Err(e) => warn!("Play request failed for {}: {}", self.item.id, e),
            }
        }
        self.state
    }

    /// Flip the mute flag without touching play/pause
    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        self.muted_by_fallback = false;
        self.player.set_muted(self.muted);

        if self.state == PlaybackState::PlayingMuted && !self.muted {
            self.state = PlaybackState::Playing;
        }
        debug!("Item {} muted: {}", self.item.id, self.muted);
        self.publish_state();
        self.muted
    }

    pub fn like(&self) {
        info!("Liked video: {}", self.item.id);
        self.publish(ReelcamEvent::VideoLiked {
            item_id: self.item.id.clone(),
        });
    }

    /// Hand the item to the platform share capability. Absence or rejection is not an error.
    pub async fn share(&self) -> bool {
        let request = ShareRequest {
            title: self
                .item
                .title
                .clone()
                .unwrap_or_else(|| DEFAULT_SHARE_TITLE.to_string()),
            url: self.item.uri.clone(),
        };

        let delivered = match &self.share_target {
            Some(target) => match target.share(&request).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Share of {} not completed: {}", self.item.id, e);
                    false
                }
            },
            None => {
                info!(
                    "Share capability unavailable, video {} not shared",
                    self.item.id
                );
                false
            }
        };

        info!("Shared video: {} (delivered: {})", self.item.id, delivered);
        self.publish(ReelcamEvent::VideoShared {
            item_id: self.item.id.clone(),
            delivered,
        });
        delivered
    }

    pub async fn handle(&mut self, interaction: Interaction) {
        match interaction {
            Interaction::SurfaceTap => {
                self.tap().await;
            }
            Interaction::MuteTap => {
                self.toggle_mute();
            }
            Interaction::LikeTap => self.like(),
            Interaction::ShareTap => {
                self.share().await;
            }
            Interaction::HoverEnter => self.hovered = true,
            Interaction::HoverLeave => self.hovered = false,
        }
    }

    /// Stop playback when the item leaves the feed
    pub fn unmount(&mut self) {
        self.player.pause();
        self.state = PlaybackState::Paused;
        self.is_active = false;
        debug!("Unmounted item controller for {}", self.item.id);
    }

    /// Resuming keeps reporting a fallback mute until the user picks a mute setting
    fn playing_state(&self) -> PlaybackState {
        if self.muted_by_fallback {
            PlaybackState::PlayingMuted
        } else {
            PlaybackState::Playing
        }
    }

    fn set_state(&mut self, next: PlaybackState) {
        if self.state != next {
            debug!("Item {}: {:?} -> {:?}", self.item.id, self.state, next);
            self.state = next;
            self.publish_state();
        }
    }

    fn publish_state(&self) {
        self.publish(ReelcamEvent::PlaybackStateChanged {
            item_id: self.item.id.clone(),
            playing: self.state.is_playing(),
            muted: self.muted,
        });
    }

    fn publish(&self, event: ReelcamEvent) {
        if let Err(e) = self.event_bus.publish(event) {
            warn!("Failed to publish item event: {}", e);
        }
    }
}

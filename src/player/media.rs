use crate::error::PlaybackError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// The host's media playback primitive for a single item.
///
/// Item controllers run on the multi-threaded runtime and hold `&self` across awaits.
#[async_trait]
pub trait MediaPlayer: Send + Sync {
    /// Start or resume playback. Rejections carry the reason.
    async fn play(&mut self) -> Result<(), PlaybackError>;

    fn pause(&mut self);

    fn set_muted(&mut self, muted: bool);

    fn is_muted(&self) -> bool;

    fn is_paused(&self) -> bool;

    /// Restart at end of stream; requested once at mount
    fn set_loop(&mut self, enabled: bool);
}

/// Platform autoplay policy: unmuted playback is refused until the user has interacted
#[derive(Debug, Clone, Default)]
pub struct AutoplayGate {
    activated: Arc<AtomicBool>,
}

impl AutoplayGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a user gesture; lifts the restriction for every player sharing this gate
    pub fn grant(&self) {
        if !self.activated.swap(true, Ordering::SeqCst) {
            info!("User interaction recorded, unmuted autoplay allowed");
        }
    }

    pub fn allows_unmuted(&self) -> bool {
        self.activated.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct ScriptedState {
    muted: bool,
    paused: bool,
    looping: bool,
    play_calls: u32,
    failures: VecDeque<PlaybackError>,
}

/// In-memory player that logs every call.
///
/// Clones share state, so a test can keep one handle while the controller owns another.
#[derive(Debug, Clone)]
pub struct ScriptedPlayer {
    label: String,
    gate: Option<AutoplayGate>,
    state: Arc<Mutex<ScriptedState>>,
}

impl ScriptedPlayer {
    pub fn new<S: Into<String>>(label: S) -> Self {
        Self {
            label: label.into(),
            gate: None,
            state: Arc::new(Mutex::new(ScriptedState {
                muted: false,
                paused: true,
                looping: false,
                play_calls: 0,
                failures: VecDeque::new(),
            })),
        }
    }

    /// Refuse unmuted playback until the gate is granted
    pub fn with_gate(mut self, gate: AutoplayGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Queue a rejection for an upcoming `play` call
    pub fn fail_next_play(&self, error: PlaybackError) {
        self.state.lock().failures.push_back(error);
    }

    pub fn play_calls(&self) -> u32 {
        self.state.lock().play_calls
    }

    pub fn is_looping(&self) -> bool {
        self.state.lock().looping
    }
}

#[async_trait]
impl MediaPlayer for ScriptedPlayer {
    async fn play(&mut self) -> Result<(), PlaybackError> {
        let mut state = self.state.lock();
        state.play_calls += 1;

        if let Some(error) = state.failures.pop_front() {
            debug!("[{}] play rejected: {}", self.label, error);
            return Err(error);
        }

        let blocked = self
            .gate
            .as_ref()
            .map(|gate| !gate.allows_unmuted() && !state.muted)
            .unwrap_or(false);
        if blocked {
            debug!("[{}] unmuted play blocked before user interaction", self.label);
            return Err(PlaybackError::AutoplayBlocked);
        }

        state.paused = false;
        info!(
            "[{}] playing{}",
            self.label,
            if state.muted { " (muted)" } else { "" }
        );
        Ok(())
    }

    fn pause(&mut self) {
        let mut state = self.state.lock();
        if !state.paused {
            info!("[{}] paused", self.label);
        }
        state.paused = true;
    }

    fn set_muted(&mut self, muted: bool) {
        self.state.lock().muted = muted;
        debug!("[{}] muted = {}", self.label, muted);
    }

    fn is_muted(&self) -> bool {
        self.state.lock().muted
    }

    fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    fn set_loop(&mut self, enabled: bool) {
        self.state.lock().looping = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_gate_blocks_unmuted_until_granted() {
        let gate = AutoplayGate::new();
        let mut player = ScriptedPlayer::new("a").with_gate(gate.clone());

        assert_eq!(player.play().await, Err(PlaybackError::AutoplayBlocked));

        player.set_muted(true);
        assert!(player.play().await.is_ok());
        assert!(!player.is_paused());

        player.pause();
        player.set_muted(false);
        gate.grant();
        assert!(player.play().await.is_ok());
        assert_eq!(player.play_calls(), 3);
    }

    #[tokio::test]
    async fn test_scripted_failures_are_consumed_in_order() {
        let mut player = ScriptedPlayer::new("b");
        player.fail_next_play(PlaybackError::Media {
            details: "decode".to_string(),
        });

        assert!(matches!(
            player.play().await,
            Err(PlaybackError::Media { .. })
        ));
        assert!(player.play().await.is_ok());
    }
}

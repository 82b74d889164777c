mod controller;
mod media;
mod share;
mod task;
#[cfg(test)]
mod tests;

pub use controller::{Interaction, PerItemPlaybackState, PlaybackState, VideoItemController};
pub use media::{AutoplayGate, MediaPlayer, ScriptedPlayer};
pub use share::{RecordingShareTarget, ShareRequest, ShareTarget, DEFAULT_SHARE_TITLE};
pub use task::{spawn_item_controller, ItemHandle};

use super::*;
use crate::config::{PlaybackConfig, ReelcamConfig};
use crate::error::{PlaybackError, ShareError};
use crate::events::{EventBus, EventFilter, ReelcamEvent};
use crate::feed::{FeedController, VideoItem};
use std::sync::Arc;
use std::time::Duration;

fn playback_config() -> PlaybackConfig {
    ReelcamConfig::default().playback
}

fn controller_with(player: &ScriptedPlayer) -> (VideoItemController, Arc<EventBus>) {
    let bus = Arc::new(EventBus::new(64));
    let item = VideoItem::new("1", "file:///1.mp4").with_title("Sunset");
    let controller = VideoItemController::new(
        item,
        Box::new(player.clone()),
        &playback_config(),
        Arc::clone(&bus),
    );
    (controller, bus)
}

#[tokio::test]
async fn test_activation_plays_unmuted() {
    let player = ScriptedPlayer::new("1");
    let (mut controller, _bus) = controller_with(&player);

    let state = controller.set_active(true).await;

    assert_eq!(state, PlaybackState::Playing);
    assert!(!controller.is_muted());
    assert!(!player.is_muted());
    assert!(!player.is_paused());
}

#[tokio::test]
async fn test_loop_requested_at_mount() {
    let player = ScriptedPlayer::new("1");
    let (_controller, _bus) = controller_with(&player);
    assert!(player.is_looping());
}

#[tokio::test]
async fn test_autoplay_restriction_falls_back_to_muted() {
    let player = ScriptedPlayer::new("1").with_gate(AutoplayGate::new());
    let (mut controller, _bus) = controller_with(&player);

    let state = controller.set_active(true).await;

    assert_eq!(state, PlaybackState::PlayingMuted);
    assert!(controller.is_muted());
    assert!(player.is_muted());
    assert_eq!(player.play_calls(), 2);
}

#[tokio::test]
async fn test_second_rejection_stays_paused_without_more_retries() {
    let player = ScriptedPlayer::new("1");
    player.fail_next_play(PlaybackError::AutoplayBlocked);
    player.fail_next_play(PlaybackError::AutoplayBlocked);
    let (mut controller, _bus) = controller_with(&player);

    assert_eq!(controller.set_active(true).await, PlaybackState::Paused);
    assert_eq!(player.play_calls(), 2);

    // Still active: no automatic retry
    assert_eq!(controller.set_active(true).await, PlaybackState::Paused);
    assert_eq!(player.play_calls(), 2);

    // User-initiated play remains available
    assert_eq!(controller.tap().await, PlaybackState::Playing);
}

#[tokio::test]
async fn test_non_autoplay_error_is_not_retried() {
    let player = ScriptedPlayer::new("1");
    player.fail_next_play(PlaybackError::Media {
        details: "network".to_string(),
    });
    let (mut controller, _bus) = controller_with(&player);

    assert_eq!(controller.set_active(true).await, PlaybackState::Paused);
    assert_eq!(player.play_calls(), 1);
    assert!(!controller.is_muted());
}

#[tokio::test]
async fn test_deactivation_pauses_from_any_state() {
    let player = ScriptedPlayer::new("1").with_gate(AutoplayGate::new());
    let (mut controller, _bus) = controller_with(&player);

    controller.set_active(true).await;
    assert_eq!(controller.state(), PlaybackState::PlayingMuted);

    assert_eq!(controller.set_active(false).await, PlaybackState::Paused);
    assert!(player.is_paused());
}

#[tokio::test]
async fn test_mute_tap_never_changes_play_state() {
    let player = ScriptedPlayer::new("1");
    let (mut controller, _bus) = controller_with(&player);

    controller.handle(Interaction::MuteTap).await;
    assert_eq!(controller.state(), PlaybackState::Paused);
    assert!(controller.is_muted());

    controller.set_active(true).await;
    let before = controller.state();
    assert!(before.is_playing());

    controller.handle(Interaction::MuteTap).await;
    assert_eq!(controller.state(), before);
    assert!(!controller.is_muted());
    assert!(!player.is_paused());

    controller.handle(Interaction::MuteTap).await;
    assert_eq!(controller.state(), before);
    assert!(controller.is_muted());
}

#[tokio::test]
async fn test_surface_tap_never_changes_muted() {
    let player = ScriptedPlayer::new("1");
    let (mut controller, _bus) = controller_with(&player);
    controller.toggle_mute();

    controller.handle(Interaction::SurfaceTap).await;
    assert_eq!(controller.state(), PlaybackState::Playing);
    assert!(controller.is_muted());

    controller.handle(Interaction::SurfaceTap).await;
    assert_eq!(controller.state(), PlaybackState::Paused);
    assert!(controller.is_muted());
    // Manual play does not make the item active
    assert!(!controller.is_active());
}

#[tokio::test]
async fn test_mute_toggle_twice_restores_value() {
    let player = ScriptedPlayer::new("1");
    let (mut controller, _bus) = controller_with(&player);

    for start in [false, true] {
        if controller.is_muted() != start {
            controller.toggle_mute();
        }
        controller.toggle_mute();
        controller.toggle_mute();
        assert_eq!(controller.is_muted(), start);
        assert_eq!(player.is_muted(), start);
    }
}

#[tokio::test]
async fn test_unmuting_fallback_keeps_playing() {
    let player = ScriptedPlayer::new("1").with_gate(AutoplayGate::new());
    let (mut controller, _bus) = controller_with(&player);
    controller.set_active(true).await;

    assert!(!controller.toggle_mute());
    assert_eq!(controller.state(), PlaybackState::Playing);
}

#[tokio::test]
async fn test_resume_after_fallback_stays_playing_muted() {
    let player = ScriptedPlayer::new("1").with_gate(AutoplayGate::new());
    let (mut controller, _bus) = controller_with(&player);
    controller.set_active(true).await;

    assert_eq!(controller.tap().await, PlaybackState::Paused);
    assert_eq!(controller.tap().await, PlaybackState::PlayingMuted);
    assert!(controller.is_muted());

    // Leaving and re-entering the viewport resumes the same way
    controller.set_active(false).await;
    assert_eq!(controller.set_active(true).await, PlaybackState::PlayingMuted);

    // Once the user picks a mute setting the fallback no longer applies
    controller.toggle_mute();
    controller.toggle_mute();
    assert!(controller.is_muted());
    assert_eq!(controller.tap().await, PlaybackState::Paused);
    assert_eq!(controller.tap().await, PlaybackState::Playing);
}

#[tokio::test]
async fn test_play_indicator_on_hover_when_not_playing() {
    let player = ScriptedPlayer::new("1");
    let (mut controller, _bus) = controller_with(&player);

    assert!(!controller.shows_play_indicator());
    controller.handle(Interaction::HoverEnter).await;
    assert!(controller.shows_play_indicator());

    controller.set_active(true).await;
    assert!(!controller.shows_play_indicator());

    controller.set_active(false).await;
    controller.handle(Interaction::HoverLeave).await;
    assert!(!controller.shows_play_indicator());
}

#[tokio::test]
async fn test_like_and_share_publish_events() {
    let player = ScriptedPlayer::new("1");
    let target = RecordingShareTarget::new();
    let (controller, bus) = controller_with(&player);
    let controller = controller.with_share_target(Arc::new(target.clone()));
    let mut events = bus.subscribe_filtered(
        EventFilter::EventTypes(vec!["video_liked", "video_shared"]),
        "player_test",
    );

    controller.like();
    assert!(controller.share().await);

    assert!(matches!(
        events.try_recv().unwrap(),
        Some(ReelcamEvent::VideoLiked { .. })
    ));
    assert!(matches!(
        events.try_recv().unwrap(),
        Some(ReelcamEvent::VideoShared {
            delivered: true,
            ..
        })
    ));
    assert_eq!(
        target.requests(),
        vec![ShareRequest {
            title: "Sunset".to_string(),
            url: "file:///1.mp4".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_share_without_capability_is_swallowed() {
    let bus = Arc::new(EventBus::new(8));
    let controller = VideoItemController::new(
        VideoItem::new("2", "file:///2.mp4"),
        Box::new(ScriptedPlayer::new("2")),
        &playback_config(),
        bus,
    );
    assert!(!controller.share().await);

    let rejecting = controller.with_share_target(Arc::new(RecordingShareTarget::rejecting(
        ShareError::Rejected {
            details: "dismissed".to_string(),
        },
    )));
    assert!(!rejecting.share().await);
}

#[tokio::test]
async fn test_share_title_falls_back() {
    let target = RecordingShareTarget::new();
    let controller = VideoItemController::new(
        VideoItem::new("3", "file:///3.mp4"),
        Box::new(ScriptedPlayer::new("3")),
        &playback_config(),
        Arc::new(EventBus::new(8)),
    )
    .with_share_target(Arc::new(target.clone()));

    controller.share().await;
    assert_eq!(target.requests()[0].title, DEFAULT_SHARE_TITLE);
}

#[tokio::test(start_paused = true)]
async fn test_item_tasks_follow_active_item() {
    let bus = Arc::new(EventBus::new(64));
    let mut config = ReelcamConfig::default();
    config.feed.viewport_height = 100;
    let items = vec![
        VideoItem::new("1", "file:///1.mp4"),
        VideoItem::new("2", "file:///2.mp4"),
    ];
    let mut feed = FeedController::new(items.clone(), config.feed.clone(), Arc::clone(&bus)).unwrap();
    feed.mount().unwrap();

    let players: Vec<ScriptedPlayer> = items.iter().map(|i| ScriptedPlayer::new(&i.id)).collect();
    let handles: Vec<ItemHandle> = items
        .iter()
        .zip(&players)
        .map(|(item, player)| {
            let controller = VideoItemController::new(
                item.clone(),
                Box::new(player.clone()),
                &config.playback,
                Arc::clone(&bus),
            );
            spawn_item_controller(controller, feed.subscribe())
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(handles[0].state().state, PlaybackState::Playing);
    assert_eq!(handles[1].state().state, PlaybackState::Paused);

    feed.scroll_by(1);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(handles[0].state().state, PlaybackState::Paused);
    assert!(handles[1].state().is_active);
    assert!(!players[1].is_paused());

    handles[1].send(Interaction::MuteTap).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(handles[1].state().muted);
    assert!(handles[1].state().playing);
    assert_eq!(feed.active_item_id(), Some("2".to_string()));

    for handle in handles {
        handle.shutdown().await;
    }
    assert!(players.iter().all(|p| p.is_paused()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_item_task_shares_from_worker_thread() {
    let bus = Arc::new(EventBus::new(64));
    let config = ReelcamConfig::default();
    let item = VideoItem::new("1", "file:///1.mp4").with_title("Sunset");
    let feed = FeedController::new(vec![item.clone()], config.feed.clone(), Arc::clone(&bus)).unwrap();
    let target = RecordingShareTarget::new();
    let mut shared = bus.subscribe_filtered(EventFilter::EventTypes(vec!["video_shared"]), "share_test");

    let controller = VideoItemController::new(
        item,
        Box::new(ScriptedPlayer::new("1")),
        &config.playback,
        Arc::clone(&bus),
    )
    .with_share_target(Arc::new(target.clone()));
    let handle = spawn_item_controller(controller, feed.subscribe());

    handle.send(Interaction::ShareTap).await.unwrap();
    let event = tokio::time::timeout(Duration::from_secs(5), shared.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        event,
        ReelcamEvent::VideoShared {
            delivered: true,
            ..
        }
    ));
    assert_eq!(target.requests().len(), 1);

    handle.shutdown().await;
}

/// Player whose first `play` panics the task that owns it
struct PanickingPlayer;

#[async_trait::async_trait]
impl MediaPlayer for PanickingPlayer {
    async fn play(&mut self) -> Result<(), PlaybackError> {
        panic!("decoder crashed");
    }

    fn pause(&mut self) {}

    fn set_muted(&mut self, _muted: bool) {}

    fn is_muted(&self) -> bool {
        false
    }

    fn is_paused(&self) -> bool {
        true
    }

    fn set_loop(&mut self, _enabled: bool) {}
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_survives_a_crashed_item_task() {
    let bus = Arc::new(EventBus::new(16));
    let mut config = ReelcamConfig::default();
    config.feed.viewport_height = 100;
    let item = VideoItem::new("1", "file:///1.mp4");
    let mut feed = FeedController::new(vec![item.clone()], config.feed.clone(), Arc::clone(&bus)).unwrap();
    feed.mount().unwrap();

    let controller = VideoItemController::new(item, Box::new(PanickingPlayer), &config.playback, bus);
    let handle = spawn_item_controller(controller, feed.subscribe());

    // Activation calls play, which takes the task down
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(handle.send(Interaction::LikeTap).await.is_err());

    handle.shutdown().await;
}

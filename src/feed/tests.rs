use super::*;
use crate::config::{ExitPolicy, FeedConfig, ReelcamConfig, TieBreak};
use crate::events::{EventBus, EventFilter, ReelcamEvent};
use std::sync::Arc;
use std::time::Duration;

fn feed_config() -> FeedConfig {
    let mut config = ReelcamConfig::default().feed;
    config.viewport_height = 100;
    config
}

fn items(ids: &[&str]) -> Vec<VideoItem> {
    ids.iter()
        .map(|id| VideoItem::new(*id, format!("file:///{}.mp4", id)))
        .collect()
}

fn mounted_feed(ids: &[&str], config: FeedConfig) -> (FeedController, Arc<EventBus>) {
    let bus = Arc::new(EventBus::new(64));
    let mut feed = FeedController::new(items(ids), config, Arc::clone(&bus)).unwrap();
    feed.mount().unwrap();
    (feed, bus)
}

#[tokio::test(start_paused = true)]
async fn test_initial_check_activates_first_item_after_delay() {
    let (feed, _bus) = mounted_feed(&["1", "2", "3"], feed_config());

    // Registering does not report content already in view
    assert_eq!(feed.active_item_id(), None);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(feed.active_item_id(), None);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(feed.active_item_id(), Some("1".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_unmount_cancels_pending_initial_check() {
    let (mut feed, _bus) = mounted_feed(&["1", "2"], feed_config());

    feed.unmount();
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(feed.active_item_id(), None);
    assert_eq!(feed.viewport().tracker_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_scrolling_moves_active_item() {
    let (feed, _bus) = mounted_feed(&["1", "2", "3"], feed_config());
    tokio::time::sleep(Duration::from_millis(150)).await;

    feed.scroll_by(1);
    assert_eq!(feed.active_item_id(), Some("2".to_string()));

    feed.scroll_to(2);
    assert_eq!(feed.active_item_id(), Some("3".to_string()));

    feed.scroll_by(-2);
    assert_eq!(feed.active_item_id(), Some("1".to_string()));
    assert_eq!(feed.item_in_view().map(|i| i.id.as_str()), Some("1"));
}

#[tokio::test(start_paused = true)]
async fn test_partial_scroll_below_threshold_keeps_active() {
    let (feed, _bus) = mounted_feed(&["1", "2"], feed_config());
    tokio::time::sleep(Duration::from_millis(150)).await;

    feed.viewport().scroll_to_offset(40.0);
    assert_eq!(feed.active_item_id(), Some("1".to_string()));

    feed.viewport().scroll_to_offset(60.0);
    assert_eq!(feed.active_item_id(), Some("2".to_string()));

    feed.viewport().settle();
    assert_eq!(feed.viewport().scroll_offset(), 100.0);
    assert_eq!(feed.active_item_id(), Some("2".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_exactly_one_item_view_is_active() {
    let (feed, _bus) = mounted_feed(&["a", "b", "c", "d"], feed_config());
    tokio::time::sleep(Duration::from_millis(150)).await;

    for index in [3usize, 1, 2, 0] {
        feed.scroll_to(index);
        let views = feed.item_views();
        let active: Vec<_> = views.iter().filter(|v| v.is_active).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].item.id, views[index].item.id);
    }
}

#[tokio::test(start_paused = true)]
async fn test_clear_exit_policy_hands_over_to_next_item() {
    let mut config = feed_config();
    config.exit_policy = ExitPolicy::Clear;
    config.tie_break = TieBreak::LastQualifying;
    let (feed, _bus) = mounted_feed(&["1", "2"], config);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(feed.active_item_id(), Some("1".to_string()));

    // "1" leaves entirely while "2" qualifies in the same batch
    feed.scroll_to(1);
    assert_eq!(feed.active_item_id(), Some("2".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_active_changes_are_published() {
    let (feed, bus) = mounted_feed(&["1", "2"], feed_config());
    let mut events = bus.subscribe_filtered(
        EventFilter::EventTypes(vec!["active_item_changed"]),
        "feed_test",
    );
    tokio::time::sleep(Duration::from_millis(150)).await;
    feed.scroll_by(1);

    let mut seen = Vec::new();
    while let Some(event) = events.try_recv().unwrap() {
        if let ReelcamEvent::ActiveItemChanged { current, .. } = event {
            seen.push(current);
        }
    }
    assert_eq!(seen, vec![Some("1".to_string()), Some("2".to_string())]);
}

#[tokio::test(start_paused = true)]
async fn test_dynamic_items_are_observed_and_released() {
    let (mut feed, _bus) = mounted_feed(&["1", "2"], feed_config());
    tokio::time::sleep(Duration::from_millis(150)).await;

    feed.append_items(items(&["3"])).unwrap();
    assert_eq!(feed.observed_items(), vec!["1", "2", "3"]);

    feed.scroll_to(2);
    assert_eq!(feed.active_item_id(), Some("3".to_string()));

    let removed = feed.remove_item("3").unwrap();
    assert_eq!(removed.id, "3");
    assert_eq!(feed.observed_items(), vec!["1", "2"]);
    assert_eq!(feed.viewport().container_count(), 2);
    assert_ne!(feed.active_item_id(), Some("3".to_string()));

    assert!(feed.append_items(items(&["1"])).is_err());
}

#[tokio::test(start_paused = true)]
async fn test_items_appended_into_view_become_active() {
    let (mut feed, _bus) = mounted_feed(&[], feed_config());
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(feed.active_item_id(), None);

    feed.append_items(items(&["a", "b"])).unwrap();
    assert_eq!(feed.item_in_view().map(|item| item.id.as_str()), Some("a"));

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(feed.active_item_id(), Some("a".to_string()));

    // Appending below the item in view leaves the active item alone
    feed.append_items(items(&["c"])).unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(feed.active_item_id(), Some("a".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_unmount_releases_everything() {
    let (mut feed, _bus) = mounted_feed(&["1", "2", "3"], feed_config());
    tokio::time::sleep(Duration::from_millis(150)).await;
    let reader = feed.subscribe();
    assert!(reader.is_active("1"));

    feed.unmount();

    assert!(!feed.is_mounted());
    assert_eq!(feed.viewport().tracker_count(), 0);
    assert_eq!(feed.viewport().container_count(), 0);
    assert!(feed.observed_items().is_empty());
    assert_eq!(reader.current(), None);
}

#[tokio::test(start_paused = true)]
async fn test_readers_cannot_diverge_from_controller() {
    let (feed, _bus) = mounted_feed(&["1", "2"], feed_config());
    let readers: Vec<_> = (0..3).map(|_| feed.subscribe()).collect();
    tokio::time::sleep(Duration::from_millis(150)).await;
    feed.scroll_by(1);

    for reader in &readers {
        assert_eq!(reader.current(), feed.active_item_id());
    }
}

#[test]
fn test_measure_visibility_from_layout() {
    let viewport = SnapViewport::new(100.0);
    viewport.mount_container("a");
    viewport.mount_container("b");

    let first = measure_visibility(&viewport, "a").unwrap();
    assert!(first.is_intersecting);
    assert_eq!(first.ratio, 1.0);

    let second = measure_visibility(&viewport, "b").unwrap();
    assert!(!second.is_intersecting);
    assert_eq!(second.ratio, 0.0);

    assert!(measure_visibility(&viewport, "missing").is_none());
}

#[test]
fn test_mount_outside_runtime_fails() {
    let bus = Arc::new(EventBus::new(8));
    let mut feed = FeedController::new(items(&["1"]), feed_config(), bus).unwrap();
    assert!(feed.mount().is_err());
}

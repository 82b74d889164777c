use crate::config::FeedConfig;
use crate::error::{ReelcamError, Result};
use crate::events::EventBus;
use crate::feed::active::{ActiveItemReader, ActiveItemWriter};
use crate::feed::item::{validate_items, VideoItem};
use crate::feed::observer::ViewportObserver;
use crate::feed::policy::PlaybackPolicy;
use crate::feed::viewport::{ObserverOptions, SnapViewport};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What an item renderer receives: its item and whether it is the active one
#[derive(Debug, Clone, PartialEq)]
pub struct ItemView<'a> {
    pub item: &'a VideoItem,
    pub is_active: bool,
}

/// Owns the ordered items and the ActiveItemId of one feed instance
pub struct FeedController {
    items: Vec<VideoItem>,
    config: FeedConfig,
    policy: PlaybackPolicy,
    viewport: SnapViewport,
    active: ActiveItemWriter,
    observer: Option<ViewportObserver>,
}

impl FeedController {
    pub fn new(items: Vec<VideoItem>, config: FeedConfig, event_bus: Arc<EventBus>) -> Result<Self> {
        validate_items(&items)?;

        info!(
            "Creating feed with {} items (threshold {:.2}, tie break {:?}, exit policy {:?})",
            items.len(),
            config.visibility_threshold,
            config.tie_break,
            config.exit_policy
        );

        Ok(Self {
            policy: PlaybackPolicy::from_config(&config),
            viewport: SnapViewport::new(config.viewport_height as f64),
            active: ActiveItemWriter::new(event_bus),
            items,
            config,
            observer: None,
        })
    }

    /// Lay out one container per item, start observing them and schedule the initial check
    pub fn mount(&mut self) -> Result<()> {
        if self.observer.is_some() {
            warn!("Feed is already mounted");
            return Ok(());
        }

        for item in &self.items {
            self.viewport.mount_container(&item.id);
        }

        let mut observer = ViewportObserver::new(
            &self.viewport,
            ObserverOptions {
                margin: self.config.root_margin,
                threshold: self.config.visibility_threshold,
            },
            self.policy,
            self.active.clone(),
        );
        for item in &self.items {
            observer.observe(&item.id);
        }

        if let Some(first) = self.items.first() {
            observer.schedule_initial_check(
                first.id.clone(),
                Arc::new(self.viewport.clone()),
                Duration::from_millis(self.config.initial_check_delay_ms),
            )?;
        }

        self.observer = Some(observer);
        info!("Feed mounted with {} containers", self.items.len());
        Ok(())
    }

    /// Release the observer and clear the active item
    pub fn unmount(&mut self) {
        if let Some(mut observer) = self.observer.take() {
            observer.disconnect();
        }
        for item in &self.items {
            self.viewport.unmount_container(&item.id);
        }
        self.active.reset();
        info!("Feed unmounted");
    }

    pub fn is_mounted(&self) -> bool {
        self.observer.is_some()
    }

    pub fn items(&self) -> &[VideoItem] {
        &self.items
    }

    pub fn item(&self, item_id: &str) -> Option<&VideoItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn active_item_id(&self) -> Option<String> {
        self.active.current()
    }

    /// Read-only handle on the active item for item controllers
    pub fn subscribe(&self) -> ActiveItemReader {
        self.active.reader()
    }

    pub fn item_views(&self) -> Vec<ItemView<'_>> {
        let active = self.active.current();
        self.items
            .iter()
            .map(|item| ItemView {
                item,
                is_active: active.as_deref() == Some(item.id.as_str()),
            })
            .collect()
    }

    pub fn viewport(&self) -> &SnapViewport {
        &self.viewport
    }

    pub fn observed_items(&self) -> Vec<String> {
        self.observer
            .as_ref()
            .map(|o| o.observed())
            .unwrap_or_default()
    }

    pub fn scroll_by(&self, delta: i64) {
        self.viewport.scroll_by_items(delta);
    }

    pub fn scroll_to(&self, index: usize) {
        self.viewport.scroll_to_index(index);
    }

    /// Item currently filling the viewport at rest
    pub fn item_in_view(&self) -> Option<&VideoItem> {
        let index = self.viewport.current_index()?;
        self.items.get(index)
    }

    /// Add items to the end of the feed; observed immediately when mounted
    pub fn append_items(&mut self, new_items: Vec<VideoItem>) -> Result<()> {
        let mut combined = self.items.clone();
        combined.extend(new_items.iter().cloned());
        validate_items(&combined)?;

        for item in &new_items {
            if let Some(observer) = self.observer.as_mut() {
                self.viewport.mount_container(&item.id);
                observer.observe(&item.id);
            }
            debug!("Appended feed item {}", item.id);
        }

        self.items = combined;

        // Registering reports nothing for a container that lands in view
        if let Some(observer) = self.observer.as_mut() {
            let landed_in_view = self
                .viewport
                .current_index()
                .and_then(|index| self.items.get(index))
                .filter(|item| new_items.iter().any(|added| added.id == item.id))
                .map(|item| item.id.clone());
            if let Some(item_id) = landed_in_view {
                observer.schedule_initial_check(
                    item_id,
                    Arc::new(self.viewport.clone()),
                    Duration::from_millis(self.config.initial_check_delay_ms),
                )?;
            }
        }
        Ok(())
    }

    pub fn remove_item(&mut self, item_id: &str) -> Result<VideoItem> {
        let index = self
            .items
            .iter()
            .position(|item| item.id == item_id)
            .ok_or_else(|| ReelcamError::component("feed", format!("Unknown item: {}", item_id)))?;

        if let Some(observer) = self.observer.as_mut() {
            observer.unobserve(item_id);
            self.viewport.unmount_container(item_id);
        }
        self.active.clear_if(item_id);

        debug!("Removed feed item {}", item_id);
        Ok(self.items.remove(index))
    }
}

impl Drop for FeedController {
    fn drop(&mut self) {
        if self.observer.is_some() {
            self.unmount();
        }
    }
}

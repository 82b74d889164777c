use crate::feed::policy::VisibilityReport;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Vertical extent of a container relative to the top of the scroll viewport
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub top: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

/// Receives one batch of visibility changes per observation tick
pub type VisibilityCallback = Arc<dyn Fn(Vec<VisibilityReport>) + Send + Sync>;

/// Configuration of a visibility-tracking instance; the root is the viewport that creates it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObserverOptions {
    /// Margin grown around the root, in pixels
    pub margin: f64,
    /// Visibility ratio whose crossing triggers a report
    pub threshold: f64,
}

impl Default for ObserverOptions {
    fn default() -> Self {
        Self {
            margin: 0.0,
            threshold: 0.5,
        }
    }
}

/// Registration side of a visibility-tracking instance.
///
/// Reports go to the callback given at creation, and only when an
/// observed container crosses the threshold or starts/stops intersecting. Registering a
/// container does not produce a report for its current state.
pub trait VisibilityTracker: Send {
    fn register(&mut self, item_id: &str);
    fn unregister(&mut self, item_id: &str);
    /// Unregister everything and release the instance
    fn disconnect(&mut self);
    fn registered(&self) -> Vec<String>;
}

/// Anything that can hand out visibility-tracking instances rooted at itself
pub trait TrackerHost {
    fn create_tracker(
        &self,
        options: ObserverOptions,
        callback: VisibilityCallback,
    ) -> Box<dyn VisibilityTracker>;
}

/// Layout measurement used for the one-off check after mount
pub trait LayoutProbe: Send + Sync {
    fn bounding_rect(&self, item_id: &str) -> Option<Rect>;
    fn viewport_height(&self) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Observation {
    intersecting: bool,
    above_threshold: bool,
}

struct TrackerEntry {
    options: ObserverOptions,
    callback: VisibilityCallback,
    observed: HashMap<String, Observation>,
}

struct ViewportState {
    /// Every item is exactly one viewport tall
    item_height: f64,
    containers: Vec<String>,
    scroll_offset: f64,
    trackers: HashMap<u64, TrackerEntry>,
    next_tracker_id: u64,
}

impl ViewportState {
    fn max_offset(&self) -> f64 {
        (self.containers.len().saturating_sub(1)) as f64 * self.item_height
    }

    fn rect_of(&self, item_id: &str) -> Option<Rect> {
        let index = self.containers.iter().position(|id| id == item_id)?;
        let top = index as f64 * self.item_height - self.scroll_offset;
        Some(Rect {
            top,
            bottom: top + self.item_height,
        })
    }

    fn measure(&self, item_id: &str, options: &ObserverOptions) -> (bool, f64) {
        let Some(rect) = self.rect_of(item_id) else {
            return (false, 0.0);
        };
        let root_top = -options.margin;
        let root_bottom = self.item_height + options.margin;
        let visible = (rect.bottom.min(root_bottom) - rect.top.max(root_top)).max(0.0);
        let ratio = if rect.height() > 0.0 {
            (visible / rect.height()).clamp(0.0, 1.0)
        } else {
            0.0
        };
        (visible > 0.0, ratio)
    }

    fn observe(&self, item_id: &str, options: &ObserverOptions) -> Observation {
        let (intersecting, ratio) = self.measure(item_id, options);
        Observation {
            intersecting,
            above_threshold: ratio >= options.threshold,
        }
    }

    /// Collect one batch per tracker for every observed container whose state changed
    fn collect_changes(&mut self) -> Vec<(VisibilityCallback, Vec<VisibilityReport>)> {
        let order = self.containers.clone();
        let mut pending = Vec::new();
        let mut tracker_ids: Vec<u64> = self.trackers.keys().copied().collect();
        tracker_ids.sort_unstable();

        for tracker_id in tracker_ids {
            let mut batch = Vec::new();
            let Some(options) = self.trackers.get(&tracker_id).map(|t| t.options) else {
                continue;
            };

            for item_id in &order {
                let Some(previous) = self
                    .trackers
                    .get(&tracker_id)
                    .and_then(|t| t.observed.get(item_id))
                    .copied()
                else {
                    continue;
                };
                let (intersecting, ratio) = self.measure(item_id, &options);
                let now = Observation {
                    intersecting,
                    above_threshold: ratio >= options.threshold,
                };
                if now != previous {
                    if let Some(entry) = self.trackers.get_mut(&tracker_id) {
                        entry.observed.insert(item_id.clone(), now);
                    }
                    batch.push(VisibilityReport::new(item_id.clone(), intersecting, ratio));
                }
            }

            if !batch.is_empty() {
                if let Some(entry) = self.trackers.get(&tracker_id) {
                    pending.push((Arc::clone(&entry.callback), batch));
                }
            }
        }

        pending
    }
}

/// Vertical, mandatory-snap scroll container holding one full-height container per item.
///
/// Cloning yields another handle to the same viewport.
#[derive(Clone)]
pub struct SnapViewport {
    state: Arc<Mutex<ViewportState>>,
}

impl SnapViewport {
    pub fn new(viewport_height: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(ViewportState {
                item_height: viewport_height.max(1.0),
                containers: Vec::new(),
                scroll_offset: 0.0,
                trackers: HashMap::new(),
                next_tracker_id: 0,
            })),
        }
    }

    /// Append a container at the end of the scroll content
    pub fn mount_container(&self, item_id: &str) {
        {
            let mut state = self.state.lock();
            if state.containers.iter().any(|id| id == item_id) {
                return;
            }
            state.containers.push(item_id.to_string());
            trace!("Mounted container {}", item_id);
        }
        self.dispatch();
    }

    pub fn unmount_container(&self, item_id: &str) {
        {
            let mut state = self.state.lock();
            state.containers.retain(|id| id != item_id);
            for entry in state.trackers.values_mut() {
                entry.observed.remove(item_id);
            }
            let max_offset = state.max_offset();
            state.scroll_offset = state.scroll_offset.min(max_offset);
            trace!("Unmounted container {}", item_id);
        }
        self.dispatch();
    }

    pub fn container_count(&self) -> usize {
        self.state.lock().containers.len()
    }

    pub fn scroll_offset(&self) -> f64 {
        self.state.lock().scroll_offset
    }

    /// Free scroll, as in the middle of a gesture; no snapping is applied
    pub fn scroll_to_offset(&self, offset: f64) {
        {
            let mut state = self.state.lock();
            let max_offset = state.max_offset();
            state.scroll_offset = offset.clamp(0.0, max_offset);
        }
        self.dispatch();
    }

    /// Scroll so that the container at `index` fills the viewport
    pub fn scroll_to_index(&self, index: usize) {
        let offset = {
            let state = self.state.lock();
            let last = state.containers.len().saturating_sub(1);
            index.min(last) as f64 * state.item_height
        };
        debug!("Snapping viewport to item index {}", index);
        self.scroll_to_offset(offset);
    }

    /// Move by whole items from the current snap position
    pub fn scroll_by_items(&self, delta: i64) {
        let target = self.current_index().unwrap_or(0) as i64 + delta;
        self.scroll_to_index(target.max(0) as usize);
    }

    /// Snap to the nearest item boundary, as when a gesture ends
    pub fn settle(&self) {
        if let Some(index) = self.current_index() {
            self.scroll_to_index(index);
        }
    }

    /// Index of the container closest to the snap position
    pub fn current_index(&self) -> Option<usize> {
        let state = self.state.lock();
        if state.containers.is_empty() {
            return None;
        }
        let index = (state.scroll_offset / state.item_height).round() as usize;
        Some(index.min(state.containers.len() - 1))
    }

    pub fn item_at(&self, index: usize) -> Option<String> {
        self.state.lock().containers.get(index).cloned()
    }

    /// Number of live tracking instances rooted at this viewport
    pub fn tracker_count(&self) -> usize {
        self.state.lock().trackers.len()
    }

    /// Deliver pending reports; callbacks run without the viewport lock held
    fn dispatch(&self) {
        let pending = self.state.lock().collect_changes();
        for (callback, batch) in pending {
            debug!("Visibility batch with {} reports", batch.len());
            callback(batch);
        }
    }
}

impl TrackerHost for SnapViewport {
    fn create_tracker(
        &self,
        options: ObserverOptions,
        callback: VisibilityCallback,
    ) -> Box<dyn VisibilityTracker> {
        let mut state = self.state.lock();
        let id = state.next_tracker_id;
        state.next_tracker_id += 1;
        state.trackers.insert(
            id,
            TrackerEntry {
                options,
                callback,
                observed: HashMap::new(),
            },
        );
        debug!("Created visibility tracker {} ({:?})", id, options);

        Box::new(ViewportTracker {
            id,
            state: Arc::clone(&self.state),
            connected: true,
        })
    }
}

impl LayoutProbe for SnapViewport {
    fn bounding_rect(&self, item_id: &str) -> Option<Rect> {
        self.state.lock().rect_of(item_id)
    }

    fn viewport_height(&self) -> f64 {
        self.state.lock().item_height
    }
}

/// Tracking instance handed out by [`SnapViewport`]
pub struct ViewportTracker {
    id: u64,
    state: Arc<Mutex<ViewportState>>,
    connected: bool,
}

impl VisibilityTracker for ViewportTracker {
    fn register(&mut self, item_id: &str) {
        if !self.connected {
            return;
        }
        let mut state = self.state.lock();
        let Some(options) = state.trackers.get(&self.id).map(|t| t.options) else {
            return;
        };
        let observation = state.observe(item_id, &options);
        if let Some(entry) = state.trackers.get_mut(&self.id) {
            entry.observed.insert(item_id.to_string(), observation);
        }
    }

    fn unregister(&mut self, item_id: &str) {
        if let Some(entry) = self.state.lock().trackers.get_mut(&self.id) {
            entry.observed.remove(item_id);
        }
    }

    fn disconnect(&mut self) {
        if self.connected {
            self.state.lock().trackers.remove(&self.id);
            self.connected = false;
            debug!("Visibility tracker {} disconnected", self.id);
        }
    }

    fn registered(&self) -> Vec<String> {
        let state = self.state.lock();
        let Some(entry) = state.trackers.get(&self.id) else {
            return Vec::new();
        };
        state
            .containers
            .iter()
            .filter(|id| entry.observed.contains_key(*id))
            .cloned()
            .collect()
    }
}

impl Drop for ViewportTracker {
    fn drop(&mut self) {
        self.disconnect();
    }
}

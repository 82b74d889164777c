mod active;
mod controller;
mod item;
mod observer;
mod policy;
mod viewport;
#[cfg(test)]
mod tests;

pub use active::ActiveItemReader;
pub use controller::{FeedController, ItemView};
pub use item::{load_feed, load_feed_file, sample_catalogue, validate_items, VideoItem};
pub use observer::{measure_visibility, ViewportObserver};
pub use policy::{PlaybackPolicy, VisibilityReport};
pub use viewport::{
    LayoutProbe, ObserverOptions, Rect, SnapViewport, TrackerHost, ViewportTracker,
    VisibilityCallback, VisibilityTracker,
};

use crate::frame::FrameData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug)]
struct TrackInner {
    id: String,
    label: String,
    live: AtomicBool,
    /// Tells the producer to release the device
    stop: CancellationToken,
    /// Fired when the source ends the track on its own
    ended: CancellationToken,
}

/// One video track of a camera stream. Clones refer to the same track.
#[derive(Debug, Clone)]
pub struct MediaTrack {
    inner: Arc<TrackInner>,
}

impl MediaTrack {
    pub fn new<S: Into<String>>(label: S) -> Self {
        Self {
            inner: Arc::new(TrackInner {
                id: Uuid::new_v4().to_string(),
                label: label.into(),
                live: AtomicBool::new(true),
                stop: CancellationToken::new(),
                ended: CancellationToken::new(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn is_live(&self) -> bool {
        self.inner.live.load(Ordering::SeqCst)
    }

    /// Stop the track and release the hardware. Does not fire `ended`.
    pub fn stop(&self) -> bool {
        let was_live = self.inner.live.swap(false, Ordering::SeqCst);
        if was_live {
            self.inner.stop.cancel();
            info!("Stopped track {} ({})", self.inner.label, self.inner.id);
        }
        was_live
    }

    /// End the track from the source side, as on device loss or permission revocation
    pub fn end(&self) {
        if self.inner.live.swap(false, Ordering::SeqCst) {
            info!("Track {} ended by source", self.inner.label);
        }
        self.inner.stop.cancel();
        self.inner.ended.cancel();
    }

    /// Cancelled once the producer must let go of the device
    pub fn stop_token(&self) -> CancellationToken {
        self.inner.stop.clone()
    }

    /// Cancelled when the source ends the track
    pub fn ended_token(&self) -> CancellationToken {
        self.inner.ended.clone()
    }
}

/// Live camera stream handed out by a [`CameraSource`](super::CameraSource)
#[derive(Debug)]
pub struct MediaStream {
    id: String,
    tracks: Vec<MediaTrack>,
    frames: watch::Receiver<Option<FrameData>>,
    width: u32,
    height: u32,
}

impl MediaStream {
    pub fn new(
        tracks: Vec<MediaTrack>,
        frames: watch::Receiver<Option<FrameData>>,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tracks,
            frames,
            width,
            height,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    /// Intrinsic video size
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn latest_frame(&self) -> Option<FrameData> {
        self.frames.borrow().clone()
    }

    pub fn frames(&self) -> watch::Receiver<Option<FrameData>> {
        self.frames.clone()
    }

    /// Stop every track; returns how many were still live
    pub fn stop_all_tracks(&self) -> usize {
        let stopped = self.tracks.iter().filter(|track| track.stop()).count();
        debug!("Stream {}: stopped {} live tracks", self.id, stopped);
        stopped
    }

    pub fn all_tracks_stopped(&self) -> bool {
        self.tracks.iter().all(|track| !track.is_live())
    }
}

impl Drop for MediaStream {
    fn drop(&mut self) {
        if !self.all_tracks_stopped() {
            warn!("Stream {} dropped with live tracks, stopping them", self.id);
            self.stop_all_tracks();
        }
    }
}

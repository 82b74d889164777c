use crate::camera::source::CameraSource;
use crate::camera::stream::{MediaStream, MediaTrack};
use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::frame::{FrameData, FrameFormat};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tracing::{debug, info, trace};

#[derive(Debug, Clone, PartialEq)]
enum MockAccess {
    Grant,
    Deny,
    Fail(String),
}

/// Synthetic camera producing RGB gradient frames, no hardware required
#[derive(Debug, Clone)]
pub struct MockCameraSource {
    access: MockAccess,
    open_calls: Arc<AtomicU32>,
    issued: Arc<Mutex<Vec<MediaTrack>>>,
}

impl Default for MockCameraSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCameraSource {
    pub fn new() -> Self {
        Self {
            access: MockAccess::Grant,
            open_calls: Arc::new(AtomicU32::new(0)),
            issued: Arc::default(),
        }
    }

    /// Every open is refused with a permission error
    pub fn denying() -> Self {
        Self {
            access: MockAccess::Deny,
            ..Self::new()
        }
    }

    /// Every open fails with a device error
    pub fn failing<S: Into<String>>(details: S) -> Self {
        Self {
            access: MockAccess::Fail(details.into()),
            ..Self::new()
        }
    }

    pub fn open_calls(&self) -> u32 {
        self.open_calls.load(Ordering::SeqCst)
    }

    /// All tracks ever handed out
    pub fn issued_tracks(&self) -> Vec<MediaTrack> {
        self.issued.lock().clone()
    }
}

#[async_trait]
impl CameraSource for MockCameraSource {
    async fn open(&self, config: &CameraConfig) -> Result<MediaStream, CameraError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);

        match &self.access {
            MockAccess::Deny => return Err(CameraError::PermissionDenied),
            MockAccess::Fail(details) => {
                return Err(CameraError::DeviceOpen {
                    device: format!("mock{}", config.index),
                    details: details.clone(),
                })
            }
            MockAccess::Grant => {}
        }

        let (width, height) = config.resolution;
        let track = MediaTrack::new(format!("Mock camera {} ({:?})", config.index, config.facing));
        let (frame_tx, frame_rx) = watch::channel(None);

        let stop = track.stop_token();
        let frame_interval = Duration::from_millis(1000 / config.fps.max(1) as u64);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(frame_interval);
            let mut frame_id = 0u64;
            info!("Mock capture loop started ({}x{})", width, height);

            loop {
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    _ = interval.tick() => {
                        let frame = synthetic_frame(frame_id, width, height);
                        trace!("Generated mock frame {}", frame_id);
                        frame_tx.send_replace(Some(frame));
                        frame_id += 1;
                    }
                }
            }

            debug!("Mock capture loop stopped after {} frames", frame_id);
        });

        self.issued.lock().push(track.clone());
        Ok(MediaStream::new(vec![track], frame_rx, width, height))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Horizontal gradient with a bar that moves one column per frame
fn synthetic_frame(frame_id: u64, width: u32, height: u32) -> FrameData {
    let mut data = Vec::with_capacity(width as usize * height as usize * 3);
    let bar = if width > 0 { (frame_id % width as u64) as u32 } else { 0 };

    for _y in 0..height {
        for x in 0..width {
            let shade = if width > 1 { (x * 255 / (width - 1)) as u8 } else { 0 };
            if x == bar {
                data.extend_from_slice(&[255, 255, 255]);
            } else {
                data.extend_from_slice(&[shade / 2, shade, 96]);
            }
        }
    }

    FrameData::new(frame_id, SystemTime::now(), data, width, height, FrameFormat::Rgb24)
}

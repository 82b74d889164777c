use crate::camera::source::CameraSource;
use crate::camera::stream::{MediaStream, MediaTrack};
use crate::config::CameraConfig;
use crate::error::{CameraError, ReelcamError, Result};
use crate::frame::{FrameData, FrameFormat};
use async_trait::async_trait;
use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::io::ErrorKind;
use std::time::{Duration, SystemTime};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, trace, warn};

const WATCHDOG_TIMEOUT: Duration = Duration::from_secs(5);

/// V4L2 camera through a GStreamer pipeline delivering RGB frames
pub struct V4l2CameraSource;

impl V4l2CameraSource {
    pub fn new() -> Result<Self> {
        gstreamer::init().map_err(|e| {
            ReelcamError::Camera(CameraError::Configuration {
                details: format!("Failed to initialize GStreamer: {}", e),
            })
        })?;
        Ok(Self)
    }

    fn device_path(config: &CameraConfig) -> String {
        format!("/dev/video{}", config.index)
    }

    /// Distinguish a permission problem from a missing device before building the pipeline
    fn check_access(device: &str) -> std::result::Result<(), CameraError> {
        match std::fs::OpenOptions::new().read(true).open(device) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => Err(CameraError::PermissionDenied),
            Err(e) => Err(CameraError::DeviceOpen {
                device: device.to_string(),
                details: e.to_string(),
            }),
        }
    }

    fn pipeline_description(device: &str, config: &CameraConfig) -> String {
        let (width, height) = config.resolution;
        format!(
            "v4l2src device={} io-mode=mmap do-timestamp=true ! \
             videoconvert ! videoscale ! \
             video/x-raw,format=RGB,width={},height={},framerate={}/1 ! \
             queue max-size-buffers=4 leaky=downstream ! \
             appsink name=sink sync=false max-buffers=2 drop=true enable-last-sample=false",
            device, width, height, config.fps
        )
    }

    fn frame_from_sample(sample: &gstreamer::Sample, frame_id: u64) -> std::result::Result<FrameData, CameraError> {
        let buffer = sample.buffer().ok_or_else(|| CameraError::CaptureStream {
            details: "No buffer in sample".to_string(),
        })?;
        let caps = sample.caps().ok_or_else(|| CameraError::CaptureStream {
            details: "No caps in sample".to_string(),
        })?;
        let info = VideoInfo::from_caps(caps).map_err(|e| CameraError::CaptureStream {
            details: format!("Failed to get video info: {}", e),
        })?;
        let map = buffer.map_readable().map_err(|e| CameraError::CaptureStream {
            details: format!("Failed to map buffer: {}", e),
        })?;

        let (width, height) = (info.width(), info.height());
        let stride = info.stride()[0] as usize;
        let row = width as usize * 3;
        let data = if stride == row {
            map.as_slice().to_vec()
        } else {
            // Drop row padding
            map.as_slice()
                .chunks(stride)
                .take(height as usize)
                .flat_map(|chunk| chunk[..row.min(chunk.len())].iter().copied())
                .collect()
        };

        Ok(FrameData::new(
            frame_id,
            SystemTime::now(),
            data,
            width,
            height,
            FrameFormat::Rgb24,
        ))
    }
}

#[async_trait]
impl CameraSource for V4l2CameraSource {
    async fn open(&self, config: &CameraConfig) -> std::result::Result<MediaStream, CameraError> {
        let device = Self::device_path(config);
        Self::check_access(&device)?;
        debug!("V4L2 devices have no facing mode; requested {:?}", config.facing);

        let description = Self::pipeline_description(&device, config);
        info!("Creating GStreamer pipeline: {}", description);

        let pipeline = gstreamer::parse::launch(&description)
            .map_err(|e| CameraError::Configuration {
                details: format!("Failed to create pipeline: {}", e),
            })?
            .downcast::<Pipeline>()
            .map_err(|_| CameraError::Configuration {
                details: "Failed to downcast to Pipeline".to_string(),
            })?;

        let appsink = pipeline
            .by_name("sink")
            .and_then(|element| element.downcast::<AppSink>().ok())
            .ok_or_else(|| CameraError::Configuration {
                details: "Pipeline has no appsink".to_string(),
            })?;

        let (sample_tx, mut sample_rx) = mpsc::unbounded_channel();
        appsink.set_callbacks(
            gstreamer_app::AppSinkCallbacks::builder()
                .new_sample(move |sink| {
                    let sample = sink.pull_sample().map_err(|_| gstreamer::FlowError::Eos)?;
                    let _ = sample_tx.send(sample);
                    Ok(gstreamer::FlowSuccess::Ok)
                })
                .build(),
        );

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| CameraError::DeviceOpen {
                device: device.clone(),
                details: format!("Failed to start pipeline: {}", e),
            })?;

        let track = MediaTrack::new(format!("V4L2 camera {}", device));
        let (frame_tx, frame_rx) = watch::channel(None);
        let stop = track.stop_token();
        let source_track = track.clone();

        tokio::spawn(async move {
            let mut frame_id = 0u64;
            let mut last_sample = tokio::time::Instant::now();
            let mut watchdog = tokio::time::interval(Duration::from_secs(1));

            loop {
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    sample = sample_rx.recv() => match sample {
                        Some(sample) => {
                            match Self::frame_from_sample(&sample, frame_id) {
                                Ok(frame) => {
                                    trace!("Captured frame {} ({}x{})", frame_id, frame.width, frame.height);
                                    frame_tx.send_replace(Some(frame));
                                    frame_id += 1;
                                }
                                Err(e) => error!("Error processing GStreamer sample: {}", e),
                            }
                            last_sample = tokio::time::Instant::now();
                        }
                        None => {
                            warn!("Camera pipeline closed");
                            source_track.end();
                            break;
                        }
                    },
                    _ = watchdog.tick() => {
                        if last_sample.elapsed() >= WATCHDOG_TIMEOUT {
                            warn!("No camera frames for {:?}; treating track as ended", WATCHDOG_TIMEOUT);
                            source_track.end();
                            break;
                        }
                    }
                }
            }

            if let Err(e) = pipeline.set_state(gstreamer::State::Null) {
                error!("Failed to release camera pipeline: {}", e);
            }
            info!("GStreamer capture loop stopped after {} frames", frame_id);
        });

        let (width, height) = config.resolution;
        Ok(MediaStream::new(vec![track], frame_rx, width, height))
    }

    fn name(&self) -> &str {
        "v4l2"
    }
}

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// Insert a timestamp before the extension so captures never overwrite each other
pub fn timestamped_file_name(base: &str, at: DateTime<Local>) -> String {
    let stamp = at.format("%Y%m%d-%H%M%S%.3f").to_string().replace('.', "-");
    match Path::new(base).extension().and_then(|e| e.to_str()) {
        Some(ext) => {
            let stem = &base[..base.len() - ext.len() - 1];
            format!("{}-{}.{}", stem, stamp, ext)
        }
        None => format!("{}-{}", base, stamp),
    }
}

pub fn screenshot_path(dir: &str, base: &str, at: DateTime<Local>) -> PathBuf {
    Path::new(dir).join(timestamped_file_name(base, at))
}

#[cfg(feature = "overlay")]
pub use writer::save_screenshot;

#[cfg(feature = "overlay")]
mod writer {
    use super::screenshot_path;
    use crate::config::ScreenshotConfig;
    use crate::detection::overlay::{OverlayRenderer, OverlayStyle};
    use crate::detection::types::Detection;
    use crate::error::{ReelcamError, Result};
    use crate::frame::FrameData;
    use chrono::Local;
    use image::codecs::jpeg::JpegEncoder;
    use image::DynamicImage;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tracing::info;

    const JPEG_QUALITY: u8 = 90;

    /// Draw `detections` onto `frame` at intrinsic size and write a JPEG
    pub async fn save_screenshot(
        frame: FrameData,
        detections: Vec<Detection>,
        config: &ScreenshotConfig,
        renderer: Arc<OverlayRenderer>,
    ) -> Result<PathBuf> {
        let path = screenshot_path(&config.path, &config.file_name, Local::now());
        let style = OverlayStyle::capture(config);
        let target = path.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut canvas = frame.to_rgba_image()?;
            renderer.draw(&mut canvas, &detections, &style);

            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let rgb = DynamicImage::ImageRgba8(canvas).to_rgb8();
            let file = std::fs::File::create(&target)?;
            let mut writer = std::io::BufWriter::new(file);
            JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY)
                .encode_image(&rgb)
                .map_err(|e| ReelcamError::overlay(format!("Failed to encode screenshot: {}", e)))?;
            Ok(())
        })
        .await
        .map_err(|e| ReelcamError::system(format!("Screenshot task failed: {}", e)))??;

        info!("Screenshot saved to {}", path.display());
        Ok(path)
    }
}

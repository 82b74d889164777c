use crate::config::ScreenshotConfig;
use crate::detection::types::{BoundingBox, Detection};

/// Labels hug the top edge of their box unless that would leave the canvas
const LABEL_EDGE: f32 = 10.0;
const LABEL_OFFSET: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    pub line_width: u32,
    pub font_size: f32,
    /// Baseline used when the box is too close to the top
    pub min_label_y: f32,
}

impl OverlayStyle {
    /// Live overlay on top of the video
    pub fn live(config: &ScreenshotConfig) -> Self {
        Self {
            line_width: config.live_line_width,
            font_size: config.live_font_size,
            min_label_y: LABEL_EDGE,
        }
    }

    /// Burned into saved screenshots
    pub fn capture(config: &ScreenshotConfig) -> Self {
        Self {
            line_width: config.capture_line_width,
            font_size: config.capture_font_size,
            min_label_y: config.capture_font_size,
        }
    }
}

/// Text baseline for a box label
pub fn label_anchor(bbox: &BoundingBox, style: &OverlayStyle) -> (f32, f32) {
    let y = if bbox.y > LABEL_EDGE {
        bbox.y - LABEL_OFFSET
    } else {
        style.min_label_y
    };
    (bbox.x, y)
}

/// Map boxes from intrinsic video size to the canvas size
pub fn scale_detections(detections: &[Detection], from: (u32, u32), to: (u32, u32)) -> Vec<Detection> {
    if from.0 == 0 || from.1 == 0 {
        return Vec::new();
    }
    let sx = to.0 as f32 / from.0 as f32;
    let sy = to.1 as f32 / from.1 as f32;
    detections
        .iter()
        .map(|d| Detection {
            bounding_box: d.bounding_box.scaled(sx, sy),
            ..d.clone()
        })
        .collect()
}

#[cfg(feature = "overlay")]
pub use renderer::OverlayRenderer;

#[cfg(feature = "overlay")]
mod renderer {
    use super::{label_anchor, OverlayStyle};
    use crate::detection::types::Detection;
    use crate::error::{ReelcamError, Result};
    use image::{Rgba, RgbaImage};
    use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
    use imageproc::rect::Rect;
    use rusttype::{Font, Scale};
    use tracing::debug;

    const BOX_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
    const ALARM_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);

    /// Draws detection boxes and labels onto RGBA canvases
    pub struct OverlayRenderer {
        font: Option<Font<'static>>,
    }

    impl OverlayRenderer {
        pub fn load(font_path: &str) -> Result<Self> {
            let font_data = std::fs::read(font_path).map_err(|e| {
                ReelcamError::overlay(format!("Failed to read font file '{}': {}", font_path, e))
            })?;
            let font = Font::try_from_vec(font_data).ok_or_else(|| {
                ReelcamError::overlay(format!("Failed to parse font file '{}'", font_path))
            })?;
            Ok(Self { font: Some(font) })
        }

        /// Boxes only
        pub fn without_labels() -> Self {
            Self { font: None }
        }

        pub fn has_labels(&self) -> bool {
            self.font.is_some()
        }

        pub fn draw(&self, canvas: &mut RgbaImage, detections: &[Detection], style: &OverlayStyle) {
            for detection in detections {
                let bbox = &detection.bounding_box;
                let x = bbox.x.round() as i32;
                let y = bbox.y.round() as i32;
                let w = bbox.width.round().max(1.0) as u32;
                let h = bbox.height.round().max(1.0) as u32;

                for inset in 0..style.line_width {
                    let (iw, ih) = (w.saturating_sub(inset * 2), h.saturating_sub(inset * 2));
                    if iw == 0 || ih == 0 {
                        break;
                    }
                    let rect = Rect::at(x + inset as i32, y + inset as i32).of_size(iw, ih);
                    draw_hollow_rect_mut(canvas, rect, BOX_COLOR);
                }

                if let Some(font) = &self.font {
                    let (lx, baseline) = label_anchor(bbox, style);
                    let top = (baseline - style.font_size).max(0.0);
                    draw_text_mut(
                        canvas,
                        BOX_COLOR,
                        lx.round() as i32,
                        top.round() as i32,
                        Scale::uniform(style.font_size),
                        font,
                        &detection.caption(),
                    );
                }
            }
            debug!("Drew {} detection boxes", detections.len());
        }

        /// Red frame around the whole canvas while the alert is active
        pub fn draw_alarm_border(&self, canvas: &mut RgbaImage, width: u32) {
            let (cw, ch) = canvas.dimensions();
            let width = width.min(cw / 2).min(ch / 2);
            if width == 0 {
                return;
            }
            for rect in [
                Rect::at(0, 0).of_size(cw, width),
                Rect::at(0, (ch - width) as i32).of_size(cw, width),
                Rect::at(0, 0).of_size(width, ch),
                Rect::at((cw - width) as i32, 0).of_size(width, ch),
            ] {
                draw_filled_rect_mut(canvas, rect, ALARM_COLOR);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReelcamConfig;

    fn bbox(y: f32) -> BoundingBox {
        BoundingBox::new(20.0, y, 50.0, 40.0)
    }

    #[test]
    fn test_label_above_box_when_room() {
        let style = OverlayStyle::live(&ReelcamConfig::default().screenshot);
        assert_eq!(label_anchor(&bbox(30.0), &style), (20.0, 25.0));
    }

    #[test]
    fn test_label_clamped_near_top() {
        let config = ReelcamConfig::default().screenshot;
        assert_eq!(label_anchor(&bbox(10.0), &OverlayStyle::live(&config)), (20.0, 10.0));
        assert_eq!(label_anchor(&bbox(4.0), &OverlayStyle::capture(&config)), (20.0, 18.0));
    }

    #[test]
    fn test_capture_style_is_heavier() {
        let config = ReelcamConfig::default().screenshot;
        let live = OverlayStyle::live(&config);
        let capture = OverlayStyle::capture(&config);
        assert_eq!((live.line_width, capture.line_width), (2, 3));
        assert_eq!(capture.font_size, 18.0);
    }

    #[test]
    fn test_scale_to_canvas() {
        let detections = vec![Detection::new("person", 0.9, BoundingBox::new(64.0, 48.0, 320.0, 240.0))];
        let scaled = scale_detections(&detections, (640, 480), (320, 240));
        assert_eq!(scaled[0].bounding_box, BoundingBox::new(32.0, 24.0, 160.0, 120.0));
        assert_eq!(scaled[0].label, "person");

        assert!(scale_detections(&detections, (0, 0), (320, 240)).is_empty());
    }

    #[cfg(feature = "overlay")]
    #[test]
    fn test_renderer_draws_box_outline() {
        let mut canvas = image::RgbaImage::new(40, 40);
        let detections = vec![Detection::new("cat", 0.8, BoundingBox::new(5.0, 5.0, 20.0, 20.0))];
        let style = OverlayStyle::live(&ReelcamConfig::default().screenshot);

        let renderer = OverlayRenderer::without_labels();
        renderer.draw(&mut canvas, &detections, &style);

        assert_eq!(canvas.get_pixel(5, 5).0, [0, 255, 0, 255]);
        assert_eq!(canvas.get_pixel(6, 10).0, [0, 255, 0, 255]);
        assert_eq!(canvas.get_pixel(15, 15).0, [0, 0, 0, 0]);
    }

    #[cfg(feature = "overlay")]
    #[test]
    fn test_missing_font_is_an_overlay_error() {
        assert!(matches!(
            OverlayRenderer::load("/nonexistent/font.ttf"),
            Err(crate::error::ReelcamError::Overlay { .. })
        ));
    }
}

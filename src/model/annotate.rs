// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 检测结果叠加绘制 (overlay drawing for detection results)

use ab_glyph::{FontArc, PxScale};
use anyhow::Result;
use image::{Rgb, RgbImage};
use imageproc::rect::Rect;
use std::sync::OnceLock;
use std::time::Duration;

use crate::model::types::Detections;
use crate::model::ModelKind;
use crate::SKELETON;

/// Minimum keypoint confidence for a point (and its skeleton edges) to be drawn.
const KPT_DRAW_CONF: f32 = 0.3;

const FONT_URL: &str = "https://ultralytics.com/assets/Arial.ttf";

/// Display toggles coming from the control panel.
#[derive(Clone, Copy, Debug)]
pub struct OverlayFlags {
    pub show_box: bool,
    pub show_mask: bool,
}

impl Default for OverlayFlags {
    fn default() -> Self {
        Self {
            show_box: true,
            show_mask: true,
        }
    }
}

/// Draws detection overlays onto display frames. Holds the per-class color
/// palette and an optional label font; without a font only geometry is drawn.
pub struct Annotator {
    names: Vec<String>,
    palette: Vec<(u8, u8, u8)>,
    font: Option<FontArc>,
}

impl Annotator {
    pub fn new(names: Vec<String>) -> Self {
        let bright_colors = [
            (255u8, 0u8, 0u8), // 红色
            (0, 255, 0),       // 绿色
            (0, 0, 255),       // 蓝色
            (255, 255, 0),     // 黄色
            (255, 0, 255),     // 品红
            (0, 255, 255),     // 青色
            (255, 128, 0),     // 橙色
            (255, 0, 128),     // 粉红
            (128, 255, 0),     // 黄绿
            (0, 128, 255),     // 天蓝
            (255, 255, 255),   // 白色
            (128, 0, 255),     // 紫色
        ];
        let palette: Vec<_> = names
            .iter()
            .enumerate()
            .map(|(i, _)| bright_colors[i % bright_colors.len()])
            .collect();

        Self {
            names,
            palette,
            font: cached_font(),
        }
    }

    #[cfg(test)]
    pub(crate) fn without_font(names: Vec<String>) -> Self {
        let palette = names.iter().map(|_| (255, 0, 0)).collect();
        Self {
            names,
            palette,
            font: None,
        }
    }

    fn color(&self, class_id: usize) -> Rgb<u8> {
        let (r, g, b) = self
            .palette
            .get(class_id)
            .copied()
            .unwrap_or((255, 255, 255));
        Rgb([r, g, b])
    }

    /// Draw `detections` onto `img`, with the overlay style chosen by `kind`.
    pub fn annotate(
        &self,
        img: &mut RgbImage,
        detections: &Detections,
        kind: ModelKind,
        flags: OverlayFlags,
    ) {
        match kind {
            ModelKind::Detect => {
                if flags.show_box {
                    self.draw_boxes(img, detections, true);
                }
            }
            ModelKind::Segment => {
                if flags.show_mask {
                    self.draw_masks(img, detections);
                }
                if flags.show_box {
                    self.draw_boxes(img, detections, true);
                }
            }
            ModelKind::Pose => {
                self.draw_boxes(img, detections, false);
                self.draw_skeletons(img, detections);
            }
        }
    }

    fn draw_boxes(&self, img: &mut RgbImage, detections: &Detections, labels: bool) {
        for bbox in &detections.bboxes {
            let w = bbox.width().max(1.0) as u32;
            let h = bbox.height().max(1.0) as u32;
            let rect = Rect::at(bbox.x1 as i32, bbox.y1 as i32).of_size(w, h);
            let color = self.color(bbox.class_id);
            imageproc::drawing::draw_hollow_rect_mut(img, rect, color);

            if !labels {
                continue;
            }
            if let Some(font) = &self.font {
                let name = self
                    .names
                    .get(bbox.class_id)
                    .map(String::as_str)
                    .unwrap_or("unknown");
                let label = format!("{}: {:.4}", name, bbox.confidence);
                let scale = PxScale::from(16.0);
                let y = (bbox.y1 as i32 - 17).max(0);
                imageproc::drawing::draw_text_mut(
                    img,
                    color,
                    bbox.x1 as i32,
                    y,
                    scale,
                    font,
                    &label,
                );
            }
        }
    }

    /// Alpha-blend each instance mask over the image in the instance's color.
    fn draw_masks(&self, img: &mut RgbImage, detections: &Detections) {
        for (bbox, mask) in detections.bboxes.iter().zip(&detections.masks) {
            let color = self.color(bbox.class_id);
            for (x, y, px) in img.enumerate_pixels_mut() {
                if x >= mask.width() || y >= mask.height() {
                    continue;
                }
                if mask.get_pixel(x, y).0[0] == 0 {
                    continue;
                }
                for c in 0..3 {
                    px.0[c] = ((px.0[c] as u16 * 3 + color.0[c] as u16 * 2) / 5) as u8;
                }
            }
        }
    }

    fn draw_skeletons(&self, img: &mut RgbImage, detections: &Detections) {
        for kpts in &detections.keypoints {
            for &(a, b) in SKELETON.iter() {
                let (Some(pa), Some(pb)) = (kpts.get(a), kpts.get(b)) else {
                    continue;
                };
                if pa.confidence < KPT_DRAW_CONF || pb.confidence < KPT_DRAW_CONF {
                    continue;
                }
                imageproc::drawing::draw_line_segment_mut(
                    img,
                    (pa.x, pa.y),
                    (pb.x, pb.y),
                    Rgb([0, 255, 255]),
                );
            }
            for kpt in kpts {
                if kpt.confidence < KPT_DRAW_CONF {
                    continue;
                }
                imageproc::drawing::draw_filled_circle_mut(
                    img,
                    (kpt.x as i32, kpt.y as i32),
                    3,
                    Rgb([0, 255, 0]),
                );
            }
        }
    }
}

static LABEL_FONT: OnceLock<Option<FontArc>> = OnceLock::new();

/// Resolve the label font once per process. A failed fetch is not retried;
/// later annotators stay geometry-only.
fn cached_font() -> Option<FontArc> {
    LABEL_FONT
        .get_or_init(|| match load_font() {
            Ok(f) => Some(f),
            Err(e) => {
                log::warn!("label font unavailable, drawing without text: {e}");
                None
            }
        })
        .clone()
}

/// Load the label font from the user config dir, fetching it once if absent.
fn load_font() -> Result<FontArc> {
    let mut path = dirs::config_dir().unwrap_or_else(std::env::temp_dir);
    path.push("yolo-player");
    std::fs::create_dir_all(&path)?;
    path.push("Arial.ttf");

    if !path.exists() {
        use std::io::Read;
        log::info!("fetching label font into {}", path.display());
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(5))
            .build();
        let resp = agent.get(FONT_URL).call()?;
        let mut buf = Vec::new();
        resp.into_reader().read_to_end(&mut buf)?;
        std::fs::write(&path, &buf)?;
    }

    let bytes = std::fs::read(&path)?;
    Ok(FontArc::try_from_vec(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::{Bbox, Keypoint};
    use image::GrayImage;

    fn blank(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([0, 0, 0]))
    }

    fn person_box() -> Detections {
        Detections {
            bboxes: vec![Bbox::new(10.0, 10.0, 50.0, 50.0, 0, 0.9)],
            ..Default::default()
        }
    }

    #[test]
    fn label_font_is_resolved_once_per_process() {
        let first = cached_font();
        // the cell is filled by the first call and only cloned afterwards
        assert!(LABEL_FONT.get().is_some());
        let second = cached_font();
        assert_eq!(first.is_some(), second.is_some());
    }

    #[test]
    fn detect_draws_box_edges() {
        let ann = Annotator::without_font(vec!["person".into()]);
        let mut img = blank(100, 100);
        ann.annotate(
            &mut img,
            &person_box(),
            ModelKind::Detect,
            OverlayFlags::default(),
        );
        assert_ne!(img.get_pixel(10, 10).0, [0, 0, 0]);
        assert_ne!(img.get_pixel(30, 10).0, [0, 0, 0]);
        // interior untouched
        assert_eq!(img.get_pixel(30, 30).0, [0, 0, 0]);
    }

    #[test]
    fn detect_honors_show_box_off() {
        let ann = Annotator::without_font(vec!["person".into()]);
        let mut img = blank(100, 100);
        let untouched = img.clone();
        ann.annotate(
            &mut img,
            &person_box(),
            ModelKind::Detect,
            OverlayFlags {
                show_box: false,
                show_mask: true,
            },
        );
        assert_eq!(img, untouched);
    }

    #[test]
    fn segment_blends_mask_interior() {
        let ann = Annotator::without_font(vec!["person".into()]);
        let mut img = blank(100, 100);
        let mut mask = GrayImage::new(100, 100);
        for y in 10..50 {
            for x in 10..50 {
                mask.put_pixel(x, y, image::Luma([255]));
            }
        }
        let dets = Detections {
            bboxes: vec![Bbox::new(10.0, 10.0, 50.0, 50.0, 0, 0.9)],
            masks: vec![mask],
            ..Default::default()
        };
        ann.annotate(
            &mut img,
            &dets,
            ModelKind::Segment,
            OverlayFlags {
                show_box: false,
                show_mask: true,
            },
        );
        // inside the mask tinted, outside untouched
        assert_ne!(img.get_pixel(30, 30).0, [0, 0, 0]);
        assert_eq!(img.get_pixel(70, 70).0, [0, 0, 0]);
    }

    #[test]
    fn pose_draws_confident_keypoints_only() {
        let ann = Annotator::without_font(vec!["person".into()]);
        let mut img = blank(100, 100);
        let mut kpts = vec![Keypoint::default(); 17];
        kpts[0] = Keypoint::new(20.0, 20.0, 0.9);
        kpts[5] = Keypoint::new(70.0, 70.0, 0.1); // below draw gate
        let dets = Detections {
            bboxes: vec![Bbox::new(0.0, 0.0, 99.0, 99.0, 0, 0.9)],
            keypoints: vec![kpts],
            ..Default::default()
        };
        ann.annotate(&mut img, &dets, ModelKind::Pose, OverlayFlags::default());
        assert_eq!(img.get_pixel(20, 20).0, [0, 255, 0]);
        assert_eq!(img.get_pixel(70, 70).0, [0, 0, 0]);
    }
}

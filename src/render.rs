// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 帧渲染管线 (frame rendering pipeline)
//!
//! Linear, blocking: convert, resize to display width, optionally run one
//! inference pass and draw its overlays, hand the result to the surface.

use anyhow::Result;
use image::RgbImage;

use crate::frame::{resize_to_display, Frame};
use crate::model::annotate::{Annotator, OverlayFlags};
use crate::model::yolo::Yolo;

/// Where finished frames go. The GUI backs this with a texture; tests count
/// presents.
pub trait Surface {
    fn present(&mut self, img: &RgbImage);
}

/// Turn a raw BGR frame into the display image: RGB, 800-px width, overlays
/// when a detector is supplied. Inference errors are logged and leave the
/// frame bare rather than failing the tick.
pub fn process(
    frame: &Frame,
    detector: Option<(&mut Yolo, &Annotator)>,
    flags: OverlayFlags,
) -> Result<RgbImage> {
    let rgb = frame.to_rgb();
    let mut img = resize_to_display(&rgb)?;

    if let Some((yolo, annotator)) = detector {
        match yolo.run(&img) {
            Ok(detections) => annotator.annotate(&mut img, &detections, yolo.kind(), flags),
            Err(e) => log::error!("inference failed: {e:#}"),
        }
    }
    Ok(img)
}

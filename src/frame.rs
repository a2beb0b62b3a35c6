// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 帧数据与颜色空间转换 (Frame data & color conversion)
//!
//! Frames come off the capture device in BGR order; the model and the
//! display surface want RGB. Conversion is a plain channel swap.

use anyhow::{Context, Result};
use fast_image_resize as fr;
use image::RgbImage;

/// Fixed display width of the canvas. Frames are scaled to this width with
/// the height following proportionally.
pub const DISPLAY_WIDTH: u32 = 800;

/// A raw video frame as read from the source, pixels in BGR order.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(data.len(), (width * height * 3) as usize);
        Self {
            data,
            width,
            height,
        }
    }

    /// BGR → RGB.
    pub fn to_rgb(&self) -> RgbImage {
        let mut out = Vec::with_capacity(self.data.len());
        for px in self.data.chunks_exact(3) {
            out.extend_from_slice(&[px[2], px[1], px[0]]);
        }
        RgbImage::from_raw(self.width, self.height, out).expect("frame buffer size mismatch")
    }

    /// RGB → BGR (the inverse of [`Frame::to_rgb`]).
    pub fn from_rgb(img: &RgbImage) -> Self {
        let mut data = Vec::with_capacity(img.as_raw().len());
        for px in img.as_raw().chunks_exact(3) {
            data.extend_from_slice(&[px[2], px[1], px[0]]);
        }
        Self::new(data, img.width(), img.height())
    }
}

/// Target size for the display canvas: width fixed at [`DISPLAY_WIDTH`],
/// height scaled proportionally and rounded to the nearest integer.
pub fn display_size(width: u32, height: u32) -> (u32, u32) {
    let h = (DISPLAY_WIDTH as f32 * height as f32 / width as f32).round() as u32;
    (DISPLAY_WIDTH, h.max(1))
}

/// Scale an RGB image to the display width, preserving aspect ratio.
pub fn resize_to_display(img: &RgbImage) -> Result<RgbImage> {
    let (dst_w, dst_h) = display_size(img.width(), img.height());
    if (dst_w, dst_h) == (img.width(), img.height()) {
        return Ok(img.clone());
    }

    let src =
        fr::images::ImageRef::new(img.width(), img.height(), img.as_raw(), fr::PixelType::U8x3)
            .context("failed to wrap frame for resizing")?;
    let mut dst = fr::images::Image::new(dst_w, dst_h, fr::PixelType::U8x3);

    let mut resizer = fr::Resizer::new();
    let options =
        fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear));
    resizer
        .resize(&src, &mut dst, Some(&options))
        .context("display resize failed")?;

    RgbImage::from_raw(dst_w, dst_h, dst.into_vec())
        .context("resized buffer has unexpected length")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame(width: u32, height: u32) -> Frame {
        let mut data = Vec::new();
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8]);
            }
        }
        Frame::new(data, width, height)
    }

    #[test]
    fn bgr_rgb_round_trip_is_identity() {
        let frame = gradient_frame(31, 17);
        let rgb = frame.to_rgb();
        assert_eq!(Frame::from_rgb(&rgb), frame);
    }

    #[test]
    fn rgb_conversion_swaps_channels() {
        let frame = Frame::new(vec![10, 20, 30], 1, 1);
        let rgb = frame.to_rgb();
        assert_eq!(rgb.get_pixel(0, 0).0, [30, 20, 10]);
    }

    #[test]
    fn display_size_preserves_aspect_ratio() {
        assert_eq!(display_size(1920, 1080), (800, 450));
        assert_eq!(display_size(640, 480), (800, 600));
        assert_eq!(display_size(800, 600), (800, 600));
        // 853.33… rounds to nearest
        assert_eq!(display_size(1200, 1280), (800, 853));
    }

    #[test]
    fn resize_hits_display_width() {
        let frame = gradient_frame(400, 300);
        let resized = resize_to_display(&frame.to_rgb()).unwrap();
        assert_eq!((resized.width(), resized.height()), (800, 600));
    }

    #[test]
    fn resize_is_identity_at_display_size() {
        let frame = gradient_frame(800, 450);
        let rgb = frame.to_rgb();
        let resized = resize_to_display(&rgb).unwrap();
        assert_eq!(resized, rgb);
    }
}

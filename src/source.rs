// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 视频输入源 (video input sources)
//!
//! Pull-style frame access over OpenCV `VideoCapture`. Frames come back in
//! BGR order, which is what [`crate::frame::Frame`] carries.

use anyhow::{Context, Result};
use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};
use std::path::Path;

use crate::frame::Frame;

/// A playable source of frames. File sources support frame-accurate seeking
/// and report their length; camera sources are live and unseekable.
pub trait FrameSource {
    /// Read the next frame. `None` means end of stream or device failure.
    fn read(&mut self) -> Option<Frame>;

    /// Jump so the next read returns the frame at `pos`. No-op on cameras.
    fn seek(&mut self, pos: u64);

    /// Total frame count; 0 for cameras.
    fn total_frames(&self) -> u64;

    /// Index of the next frame to be read; always 0 for cameras.
    fn position(&mut self) -> u64;

    fn is_camera(&self) -> bool;
}

fn mat_to_frame(mat: &Mat) -> Option<Frame> {
    let width = mat.cols() as u32;
    let height = mat.rows() as u32;
    let data = mat.data_bytes().ok()?.to_vec();
    if data.len() != (width * height * 3) as usize {
        log::warn!(
            "unexpected frame layout: {}x{} with {} bytes",
            width,
            height,
            data.len()
        );
        return None;
    }
    Some(Frame::new(data, width, height))
}

/// A live camera. Opening never fails: a device that cannot be opened simply
/// yields no frames.
pub struct CameraSource {
    cap: Option<VideoCapture>,
}

impl CameraSource {
    pub fn open(index: i32) -> Self {
        let cap = match VideoCapture::new(index, videoio::CAP_ANY) {
            Ok(cap) if cap.is_opened().unwrap_or(false) => Some(cap),
            Ok(_) => {
                log::warn!("camera {index} is not available");
                None
            }
            Err(e) => {
                log::warn!("failed to open camera {index}: {e}");
                None
            }
        };
        Self { cap }
    }
}

impl FrameSource for CameraSource {
    fn read(&mut self) -> Option<Frame> {
        let cap = self.cap.as_mut()?;
        let mut mat = Mat::default();
        match cap.read(&mut mat) {
            Ok(true) if !mat.empty() => mat_to_frame(&mat),
            _ => None,
        }
    }

    fn seek(&mut self, _pos: u64) {}

    fn total_frames(&self) -> u64 {
        0
    }

    fn position(&mut self) -> u64 {
        0
    }

    fn is_camera(&self) -> bool {
        true
    }
}

/// A video file with a known length.
pub struct FileSource {
    cap: VideoCapture,
    total: u64,
}

impl FileSource {
    pub fn open(path: &Path) -> Result<Self> {
        let path_str = path
            .to_str()
            .with_context(|| format!("non-UTF-8 video path: {}", path.display()))?;
        let cap = VideoCapture::from_file(path_str, videoio::CAP_ANY)
            .with_context(|| format!("failed to open video {path_str}"))?;
        if !cap.is_opened().unwrap_or(false) {
            anyhow::bail!("could not open video {path_str}");
        }
        let total = cap
            .get(videoio::CAP_PROP_FRAME_COUNT)
            .unwrap_or(0.0)
            .max(0.0) as u64;
        Ok(Self { cap, total })
    }
}

impl FrameSource for FileSource {
    fn read(&mut self) -> Option<Frame> {
        let mut mat = Mat::default();
        match self.cap.read(&mut mat) {
            Ok(true) if !mat.empty() => mat_to_frame(&mat),
            _ => None,
        }
    }

    fn seek(&mut self, pos: u64) {
        if let Err(e) = self.cap.set(videoio::CAP_PROP_POS_FRAMES, pos as f64) {
            log::warn!("seek to frame {pos} failed: {e}");
        }
    }

    fn total_frames(&self) -> u64 {
        self.total
    }

    fn position(&mut self) -> u64 {
        self.cap
            .get(videoio::CAP_PROP_POS_FRAMES)
            .unwrap_or(0.0)
            .max(0.0) as u64
    }

    fn is_camera(&self) -> bool {
        false
    }
}

// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! YOLOv8 摄像头/视频检测演示 (camera & video detection demo)
//!
//! A single-threaded player: a playback controller pulls frames from a
//! camera or video file, a linear pipeline resizes them for display and
//! optionally overlays detection, segmentation or pose results from a
//! YOLOv8 ONNX model.

pub mod config;
pub mod frame;
pub mod model;
pub mod player;
pub mod render;
pub mod source;

/// COCO 17-keypoint skeleton edges for pose drawing.
pub const SKELETON: [(usize, usize); 16] = [
    (0, 1),
    (0, 2),
    (1, 3),
    (2, 4),
    (5, 6),
    (5, 11),
    (6, 12),
    (11, 12),
    (5, 7),
    (6, 8),
    (7, 9),
    (8, 10),
    (11, 13),
    (12, 14),
    (13, 15),
    (14, 16),
];

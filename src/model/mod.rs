// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 模型选择与加载 (model selection & loading)

pub mod annotate;
pub mod types;
pub mod yolo;

use std::path::{Path, PathBuf};

/// Which YOLOv8 task head a model carries. Fixed when the model is loaded;
/// everything downstream (decode layout, overlay style) switches on this.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelKind {
    Detect,
    Segment,
    Pose,
}

/// YOLOv8 model scale, smallest to largest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelSize {
    N,
    S,
    M,
    L,
    X,
}

impl ModelSize {
    pub fn letter(self) -> char {
        match self {
            ModelSize::N => 'n',
            ModelSize::S => 's',
            ModelSize::M => 'm',
            ModelSize::L => 'l',
            ModelSize::X => 'x',
        }
    }
}

/// Confidence gates applied during postprocessing.
#[derive(Clone, Copy, Debug)]
pub struct Thresholds {
    /// Minimum class confidence for a box to survive.
    pub conf: f32,
    /// IoU above which NMS suppresses the lower-confidence box.
    pub iou: f32,
    /// Minimum per-keypoint confidence (pose only).
    pub kconf: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            conf: 0.25,
            iou: 0.7,
            kconf: 0.55,
        }
    }
}

/// Artifact path for a (kind, size) pair under `model_dir`:
/// `yolov8{size}.onnx`, `yolov8{size}-seg.onnx` or `yolov8{size}-pose.onnx`.
pub fn artifact_path(model_dir: &Path, kind: ModelKind, size: ModelSize) -> PathBuf {
    let suffix = match kind {
        ModelKind::Detect => "",
        ModelKind::Segment => "-seg",
        ModelKind::Pose => "-pose",
    };
    model_dir.join(format!("yolov8{}{}.onnx", size.letter(), suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_naming_convention() {
        let dir = Path::new("models");
        let cases = [
            (ModelKind::Detect, ModelSize::N, "models/yolov8n.onnx"),
            (ModelKind::Detect, ModelSize::X, "models/yolov8x.onnx"),
            (ModelKind::Segment, ModelSize::S, "models/yolov8s-seg.onnx"),
            (ModelKind::Pose, ModelSize::M, "models/yolov8m-pose.onnx"),
            (ModelKind::Segment, ModelSize::L, "models/yolov8l-seg.onnx"),
        ];
        for (kind, size, expected) in cases {
            assert_eq!(artifact_path(dir, kind, size), PathBuf::from(expected));
        }
    }
}

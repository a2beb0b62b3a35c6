// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use image::GrayImage;

/// A detection bounding box in image pixel coordinates (xyxy).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bbox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub class_id: usize,
    pub confidence: f32,
}

impl Bbox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, class_id: usize, confidence: f32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            class_id,
            confidence,
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn intersection_area(&self, other: &Bbox) -> f32 {
        let l = self.x1.max(other.x1);
        let r = self.x2.min(other.x2);
        let t = self.y1.max(other.y1);
        let b = self.y2.min(other.y2);
        (r - l).max(0.0) * (b - t).max(0.0)
    }

    pub fn iou(&self, other: &Bbox) -> f32 {
        let inter = self.intersection_area(other);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }
}

/// A pose keypoint with its own confidence. Keypoints below the keypoint
/// confidence threshold are zeroed out at decode time.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }
}

/// Decoded results of one inference pass over one frame.
///
/// `keypoints` and `masks` run parallel to `bboxes` when present (pose and
/// segmentation tasks respectively), and are empty otherwise.
#[derive(Clone, Debug, Default)]
pub struct Detections {
    pub bboxes: Vec<Bbox>,
    pub keypoints: Vec<Vec<Keypoint>>,
    pub masks: Vec<GrayImage>,
}

impl Detections {
    pub fn is_empty(&self) -> bool {
        self.bboxes.is_empty()
    }
}

/// One pre-NMS candidate: a box plus its task-specific payload.
#[derive(Clone, Debug)]
pub(crate) struct Candidate {
    pub bbox: Bbox,
    pub keypoints: Option<Vec<Keypoint>>,
    pub mask_coefs: Option<Vec<f32>>,
}

/// Greedy non-maximum suppression: keep candidates in descending confidence
/// order, dropping any that overlap an already-kept box beyond `iou_threshold`.
pub(crate) fn non_max_suppression(candidates: &mut Vec<Candidate>, iou_threshold: f32) {
    candidates.sort_by(|a, b| {
        b.bbox
            .confidence
            .partial_cmp(&a.bbox.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for cand in candidates.drain(..) {
        if kept.iter().all(|k| k.bbox.iou(&cand.bbox) <= iou_threshold) {
            kept.push(cand);
        }
    }
    *candidates = kept;
}

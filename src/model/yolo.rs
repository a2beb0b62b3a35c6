// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! YOLOv8 ONNX Runtime 推理封装 (inference wrapper)
//!
//! One session per loaded artifact. The task is fixed at load time from the
//! requested model kind, and the overlay layer switches on it rather than on
//! anything the network reports.

use anyhow::{Context, Result};
use image::{GrayImage, RgbImage};
use ndarray::{Array2, ArrayView2, ArrayView3};
use ort::session::Session;
use ort::value::Tensor;
use regex::Regex;
use std::path::Path;

use crate::model::types::{non_max_suppression, Bbox, Candidate, Detections, Keypoint};
use crate::model::{ModelKind, Thresholds};

/// Network input edge length of the standard YOLOv8 export.
const INPUT_SIZE: u32 = 640;
/// COCO pose keypoints per detection.
const NK: usize = 17;
/// Mask coefficients per detection in segmentation exports.
const NM: usize = 32;

pub struct Yolo {
    session: Session,
    kind: ModelKind,
    names: Vec<String>,
    thresholds: Thresholds,
}

impl Yolo {
    /// Build an ONNX Runtime session over the artifact at `path`.
    ///
    /// Fails when the file is unreadable or not a valid ONNX graph; the
    /// caller decides whether that replaces the active model.
    pub fn load(path: &Path, kind: ModelKind, thresholds: Thresholds) -> Result<Self> {
        let session = Session::builder()
            .context("failed to create ORT session builder")?
            .commit_from_file(path)
            .with_context(|| format!("failed to load model from {}", path.display()))?;

        let names = parse_names(&session);
        log::info!(
            "loaded {} ({:?}, {} classes)",
            path.display(),
            kind,
            names.len()
        );

        Ok(Self {
            session,
            kind,
            names,
            thresholds,
        })
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// One forward pass over `img`, returning detections in `img` pixel
    /// coordinates.
    pub fn run(&mut self, img: &RgbImage) -> Result<Detections> {
        let (tensor, ratio) = preprocess(img)?;
        let (kind, thresholds) = (self.kind, self.thresholds);

        let outputs = self
            .session
            .run(ort::inputs!["images" => tensor])
            .context("inference failed")?;

        let (shape, data) = outputs["output0"]
            .try_extract_tensor::<f32>()
            .context("failed to extract prediction tensor")?;
        let attrs = shape[1] as usize;
        let anchors = shape[2] as usize;
        let preds = ArrayView2::from_shape((attrs, anchors), &data[..attrs * anchors])
            .context("prediction tensor has unexpected layout")?;

        // class count follows from the attribute row count per task
        let nc = match kind {
            ModelKind::Detect => attrs - 4,
            ModelKind::Pose => attrs - 4 - 3 * NK,
            ModelKind::Segment => attrs - 4 - NM,
        };

        let mut candidates = decode(
            kind,
            thresholds,
            &preds,
            nc,
            ratio,
            img.width() as f32,
            img.height() as f32,
        );
        non_max_suppression(&mut candidates, thresholds.iou);

        let mut detections = Detections::default();
        for cand in candidates {
            if let Some(coefs) = cand.mask_coefs {
                let (pshape, pdata) = outputs["output1"]
                    .try_extract_tensor::<f32>()
                    .context("failed to extract mask prototype tensor")?;
                let (nm, mh, mw) = (pshape[1] as usize, pshape[2] as usize, pshape[3] as usize);
                let proto = ArrayView3::from_shape((nm, mh, mw), &pdata[..nm * mh * mw])
                    .context("prototype tensor has unexpected layout")?;
                detections
                    .masks
                    .push(build_mask(&coefs, &proto, &cand.bbox, img.width(), img.height())?);
            }
            if let Some(kpts) = cand.keypoints {
                detections.keypoints.push(kpts);
            }
            detections.bboxes.push(cand.bbox);
        }
        Ok(detections)
    }
}

/// Decode the raw prediction grid into confidence-filtered candidates.
fn decode(
    kind: ModelKind,
    thresholds: Thresholds,
    preds: &ArrayView2<f32>,
    nc: usize,
    ratio: f32,
    max_w: f32,
    max_h: f32,
) -> Vec<Candidate> {
    let mut out = Vec::new();
    for anchor in preds.columns() {
        let (class_id, &confidence) = anchor
            .slice(ndarray::s![4..4 + nc])
            .into_iter()
            .enumerate()
            .reduce(|max, x| if x.1 > max.1 { x } else { max })
            .unwrap_or((0, &0.0));
        if confidence < thresholds.conf {
            continue;
        }

        let (cx, cy, w, h) = (
            anchor[0] / ratio,
            anchor[1] / ratio,
            anchor[2] / ratio,
            anchor[3] / ratio,
        );
        let bbox = Bbox::new(
            (cx - w / 2.0).clamp(0.0, max_w),
            (cy - h / 2.0).clamp(0.0, max_h),
            (cx + w / 2.0).clamp(0.0, max_w),
            (cy + h / 2.0).clamp(0.0, max_h),
            class_id,
            confidence,
        );

        let keypoints = match kind {
            ModelKind::Pose => {
                let mut kpts = Vec::with_capacity(NK);
                for i in 0..NK {
                    let kx = anchor[4 + nc + 3 * i] / ratio;
                    let ky = anchor[4 + nc + 3 * i + 1] / ratio;
                    let kconf = anchor[4 + nc + 3 * i + 2];
                    if kconf < thresholds.kconf {
                        kpts.push(Keypoint::default());
                    } else {
                        kpts.push(Keypoint::new(
                            kx.clamp(0.0, max_w),
                            ky.clamp(0.0, max_h),
                            kconf,
                        ));
                    }
                }
                Some(kpts)
            }
            _ => None,
        };

        let mask_coefs = match kind {
            ModelKind::Segment => Some(anchor.slice(ndarray::s![4 + nc..]).to_vec()),
            _ => None,
        };

        out.push(Candidate {
            bbox,
            keypoints,
            mask_coefs,
        });
    }
    out
}

/// Proportionally resize `img` into a 640x640 NCHW tensor, padding the
/// remainder with neutral gray. Returns the tensor and the resize ratio.
fn preprocess(img: &RgbImage) -> Result<(ort::value::DynValue, f32)> {
    let (w0, h0) = (img.width() as f32, img.height() as f32);
    let ratio = (INPUT_SIZE as f32 / w0).min(INPUT_SIZE as f32 / h0);
    let (w_new, h_new) = ((w0 * ratio).round() as u32, (h0 * ratio).round() as u32);

    let resized = image::imageops::resize(img, w_new, h_new, image::imageops::FilterType::Triangle);

    let size = (INPUT_SIZE * INPUT_SIZE) as usize;
    let mut tensor_data = vec![144.0 / 255.0; 3 * size];
    let raw = resized.as_raw();
    for y in 0..h_new as usize {
        for x in 0..w_new as usize {
            let src = (y * w_new as usize + x) * 3;
            let dst = y * INPUT_SIZE as usize + x;
            tensor_data[dst] = raw[src] as f32 / 255.0;
            tensor_data[size + dst] = raw[src + 1] as f32 / 255.0;
            tensor_data[2 * size + dst] = raw[src + 2] as f32 / 255.0;
        }
    }

    let shape = [1usize, 3, INPUT_SIZE as usize, INPUT_SIZE as usize];
    let tensor = Tensor::from_array((shape, tensor_data.into_boxed_slice()))
        .context("failed to create input tensor")?
        .into_dyn();
    Ok((tensor, ratio))
}

/// Multiply one detection's mask coefficients against the prototype tensor,
/// upscale the valid region to frame size, and zero everything outside the
/// detection's box.
fn build_mask(
    coefs: &[f32],
    proto: &ArrayView3<f32>,
    bbox: &Bbox,
    frame_w: u32,
    frame_h: u32,
) -> Result<GrayImage> {
    let (nm, mh, mw) = proto.dim();
    let coefs = Array2::from_shape_vec((1, nm), coefs.to_vec())?;
    let proto_flat = proto.to_shape((nm, mh * mw))?;
    let logits = coefs.dot(&proto_flat);

    // logit > 0 is sigmoid > 0.5
    let mut mask = GrayImage::new(mw as u32, mh as u32);
    for (i, &v) in logits.iter().enumerate() {
        if v > 0.0 {
            mask.put_pixel((i % mw) as u32, (i / mw) as u32, image::Luma([255]));
        }
    }

    // only the top-left region corresponds to the unpadded input
    let ratio = (mw as f32 / frame_w as f32).min(mh as f32 / frame_h as f32);
    let valid_w = ((frame_w as f32 * ratio).round() as u32).min(mw as u32);
    let valid_h = ((frame_h as f32 * ratio).round() as u32).min(mh as u32);
    let cropped = image::imageops::crop_imm(&mask, 0, 0, valid_w, valid_h).to_image();
    let mut full = image::imageops::resize(
        &cropped,
        frame_w,
        frame_h,
        image::imageops::FilterType::Nearest,
    );

    for (x, y, px) in full.enumerate_pixels_mut() {
        let (xf, yf) = (x as f32, y as f32);
        if xf < bbox.x1 || xf > bbox.x2 || yf < bbox.y1 || yf > bbox.y2 {
            px.0[0] = 0;
        }
    }
    Ok(full)
}

/// Ultralytics exports embed the class-name map as dict-literal text in the
/// `names` metadata entry.
fn parse_names(session: &Session) -> Vec<String> {
    let raw = session
        .metadata()
        .ok()
        .and_then(|m| m.custom("names").ok().flatten());
    let Some(raw) = raw else {
        return vec!["unknown".to_string()];
    };

    let re = match Regex::new(r#"(['"])([-()\w ']+)['"]"#) {
        Ok(re) => re,
        Err(_) => return vec!["unknown".to_string()],
    };
    let names: Vec<String> = re
        .captures_iter(&raw)
        .filter_map(|c| c.get(2))
        .map(|m| m.as_str().to_string())
        .collect();
    if names.is_empty() {
        vec!["unknown".to_string()]
    } else {
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preprocess_ratio_matches_longest_edge() {
        let img = RgbImage::new(800, 450);
        let (_, ratio) = preprocess(&img).unwrap();
        assert!((ratio - 640.0 / 800.0).abs() < 1e-6);

        let tall = RgbImage::new(450, 800);
        let (_, ratio) = preprocess(&tall).unwrap();
        assert!((ratio - 640.0 / 800.0).abs() < 1e-6);
    }

    #[test]
    fn preprocess_pads_with_neutral_gray() {
        let img = RgbImage::from_pixel(800, 400, image::Rgb([255, 255, 255]));
        let (tensor, _) = preprocess(&img).unwrap();
        let (_, data) = tensor.try_extract_tensor::<f32>().unwrap();
        // bottom rows fall outside the resized content
        let size = (INPUT_SIZE * INPUT_SIZE) as usize;
        let bottom = (INPUT_SIZE as usize - 1) * INPUT_SIZE as usize;
        assert!((data[bottom] - 144.0 / 255.0).abs() < 1e-6);
        // top-left is image content
        assert!((data[0] - 1.0).abs() < 1e-6);
        assert_eq!(data.len(), 3 * size);
    }

    #[test]
    fn decode_filters_and_rescales() {
        // two anchors, one class: columns are [cx, cy, w, h, score]
        let data = vec![
            320.0, 100.0, // cx
            320.0, 100.0, // cy
            64.0, 10.0, // w
            64.0, 10.0, // h
            0.9, 0.1, // score
        ];
        let preds = ndarray::Array2::from_shape_vec((5, 2), data).unwrap();
        let cands = decode(
            ModelKind::Detect,
            Thresholds::default(),
            &preds.view(),
            1,
            0.8,
            800.0,
            600.0,
        );
        assert_eq!(cands.len(), 1);
        let b = &cands[0].bbox;
        assert!((b.x1 - (400.0 - 40.0)).abs() < 1e-3);
        assert!((b.x2 - (400.0 + 40.0)).abs() < 1e-3);
        assert_eq!(b.class_id, 0);
        assert!(cands[0].keypoints.is_none());
        assert!(cands[0].mask_coefs.is_none());
    }

    #[test]
    fn load_missing_artifact_errors() {
        let err = Yolo::load(
            Path::new("/nonexistent/yolov8n.onnx"),
            ModelKind::Detect,
            Thresholds::default(),
        );
        assert!(err.is_err());
    }
}

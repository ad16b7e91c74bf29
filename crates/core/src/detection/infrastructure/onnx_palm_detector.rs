/// BlazePalm palm detector using ONNX Runtime via `ort`.
///
/// First stage of the hand pipeline: proposes palm boxes and coarse palm
/// keypoints that the landmark stage turns into oriented hand crops. No
/// landmarks beyond the 7 palm keypoints, no handedness.
use std::path::Path;

use crate::shared::frame::Frame;

/// BlazePalm model input resolution.
const INPUT_SIZE: u32 = 192;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f32 = 0.3;

/// Number of BlazePalm anchors (full-range model).
const NUM_ANCHORS: usize = 2016;

/// Coarse palm keypoints regressed alongside each box.
pub const PALM_KEYPOINTS: usize = 7;

/// Index of the wrist-center palm keypoint.
pub const KEYPOINT_WRIST: usize = 0;

/// Index of the middle-finger-base palm keypoint; together with the wrist
/// keypoint it defines the hand axis used for crop rotation.
pub const KEYPOINT_MIDDLE_BASE: usize = 2;

/// One palm proposal in frame-normalized coordinates.
#[derive(Clone, Debug)]
pub struct PalmDetection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub keypoints: [(f32, f32); PALM_KEYPOINTS],
    pub score: f32,
}

/// Palm detector backed by an ONNX Runtime session.
pub struct OnnxPalmDetector {
    session: ort::session::Session,
    confidence: f32,
    anchors: Vec<[f32; 2]>,
}

impl OnnxPalmDetector {
    /// Load a BlazePalm ONNX model.
    pub fn new(
        model_path: &Path,
        confidence: f32,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let session = ort::session::Session::builder()?.commit_from_file(model_path)?;
        let anchors = generate_anchors();
        Ok(Self {
            session,
            confidence,
            anchors,
        })
    }

    /// Run palm detection over a whole frame.
    ///
    /// Returns score-filtered, NMS-deduplicated proposals in normalized
    /// coordinates, strongest first.
    pub fn detect_palms(
        &mut self,
        frame: &Frame,
    ) -> Result<Vec<PalmDetection>, Box<dyn std::error::Error + Send + Sync>> {
        // 1. Preprocess: resize to 192x192, normalize to [0,1], NCHW
        let input_tensor = preprocess(frame, INPUT_SIZE);

        // 2. Inference
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        // BlazePalm outputs two tensors:
        // - regressors: [1, 2016, 18] (box deltas + 7 keypoints)
        // - classificators: [1, 2016, 1] (confidence scores)
        if outputs.len() < 2 {
            return Err(
                format!("BlazePalm model expected 2 outputs, got {}", outputs.len()).into(),
            );
        }

        let regressors = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let reg_data = regressors.as_slice().ok_or("Cannot get regressor slice")?;
        let score_data = scores.as_slice().ok_or("Cannot get score slice")?;

        // 3. Decode anchor boxes + filter by confidence
        let mut raw_dets = Vec::new();
        let num_anchors = self.anchors.len().min(NUM_ANCHORS);
        let stride = 4 + 2 * PALM_KEYPOINTS;

        for (i, &raw_score) in score_data.iter().enumerate().take(num_anchors) {
            let score = sigmoid(raw_score);
            if score < self.confidence {
                continue;
            }

            let anchor = &self.anchors[i];
            let reg_offset = i * stride;
            if reg_offset + stride > reg_data.len() {
                break;
            }

            // Box center + size relative to anchor, in normalized units
            let cx = anchor[0] + reg_data[reg_offset] / INPUT_SIZE as f32;
            let cy = anchor[1] + reg_data[reg_offset + 1] / INPUT_SIZE as f32;
            let w = reg_data[reg_offset + 2] / INPUT_SIZE as f32;
            let h = reg_data[reg_offset + 3] / INPUT_SIZE as f32;

            let mut keypoints = [(0.0f32, 0.0f32); PALM_KEYPOINTS];
            for (k, kp) in keypoints.iter_mut().enumerate() {
                let kx = anchor[0] + reg_data[reg_offset + 4 + 2 * k] / INPUT_SIZE as f32;
                let ky = anchor[1] + reg_data[reg_offset + 5 + 2 * k] / INPUT_SIZE as f32;
                *kp = (kx, ky);
            }

            raw_dets.push(PalmDetection {
                x1: cx - w / 2.0,
                y1: cy - h / 2.0,
                x2: cx + w / 2.0,
                y2: cy + h / 2.0,
                keypoints,
                score,
            });
        }

        // 4. NMS
        Ok(nms(&mut raw_dets, NMS_IOU_THRESH))
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Resize frame to `size × size` and normalize to [0,1] NCHW float32.
fn preprocess(frame: &Frame, size: u32) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let s = size as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));

    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    tensor
}

// ---------------------------------------------------------------------------
// Anchor generation (BlazePalm full-range)
// ---------------------------------------------------------------------------

/// Generate BlazePalm anchors.
///
/// The model uses two feature map sizes: 24×24 and 12×12, with 2 and 6
/// anchors per cell respectively.
fn generate_anchors() -> Vec<[f32; 2]> {
    let strides = [(8, 2), (16, 6)]; // (stride, anchors_per_cell)
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);

    for &(stride, num) in &strides {
        let grid_size = INPUT_SIZE as usize / stride;
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                for _ in 0..num {
                    anchors.push([cx, cy]);
                }
            }
        }
    }

    anchors
}

// ---------------------------------------------------------------------------
// NMS
// ---------------------------------------------------------------------------

fn nms(dets: &mut [PalmDetection], iou_thresh: f32) -> Vec<PalmDetection> {
    dets.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];

    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i].clone());
        for j in (i + 1)..dets.len() {
            if suppressed[j] {
                continue;
            }
            if bbox_iou(&dets[i], &dets[j]) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}

pub(crate) fn bbox_iou(a: &PalmDetection, b: &PalmDetection) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    inter / (area_a + area_b - inter)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

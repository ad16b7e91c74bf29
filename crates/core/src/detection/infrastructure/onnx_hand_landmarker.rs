/// Hand landmark model using ONNX Runtime via `ort`.
///
/// Second stage of the hand pipeline: given an oriented square crop, the
/// model regresses 21 landmarks plus a presence score (is a hand actually
/// in the crop) and a handedness score. Scores arrive already activated
/// from the exported graph, in [0,1].
use std::path::Path;

use crate::detection::domain::hand_landmarks::{
    HandObservation, Handedness, Landmark, LANDMARK_COUNT,
};
use crate::shared::frame::Frame;

/// Landmark model input resolution.
const INPUT_SIZE: u32 = 224;

/// Handedness score at or above this reads as a Right hand. The score is
/// the probability of "Right" under the mirrored (selfie) convention the
/// pipeline always applies before detection.
const RIGHT_HAND_THRESHOLD: f32 = 0.5;

/// An oriented square crop window in frame-normalized coordinates.
///
/// `width`/`height` are normalized separately to frame width and height so
/// the window stays square in pixel space; `rotation` is radians, positive
/// counter-clockwise, about the window center.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandRoi {
    pub cx: f32,
    pub cy: f32,
    pub width: f32,
    pub height: f32,
    pub rotation: f32,
}

/// Landmark model output for one crop.
#[derive(Clone, Debug)]
pub struct LandmarkPrediction {
    pub observation: HandObservation,
    /// Probability a hand is present in the crop; gates tracking.
    pub presence: f32,
}

/// Landmark regressor backed by an ONNX Runtime session.
pub struct OnnxHandLandmarker {
    session: ort::session::Session,
}

impl OnnxHandLandmarker {
    /// Load a hand landmark ONNX model.
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let session = ort::session::Session::builder()?.commit_from_file(model_path)?;
        Ok(Self { session })
    }

    /// Run the landmark model over one region of interest.
    ///
    /// Landmarks come back in frame-normalized coordinates (mapped through
    /// the crop transform); presence is returned untouched for the caller
    /// to threshold.
    pub fn predict(
        &mut self,
        frame: &Frame,
        roi: &HandRoi,
    ) -> Result<LandmarkPrediction, Box<dyn std::error::Error + Send + Sync>> {
        // 1. Resample the oriented window to 224x224 NCHW [0,1]
        let input_tensor = crop_roi(frame, roi, INPUT_SIZE);

        // 2. Inference
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        // Hand landmark model outputs three tensors:
        // - landmarks: [1, 63] (21 × xyz, input-pixel scale)
        // - presence:  [1, 1]
        // - handedness: [1, 1] (P(Right), mirrored convention)
        if outputs.len() < 3 {
            return Err(format!(
                "hand landmark model expected 3 outputs, got {}",
                outputs.len()
            )
            .into());
        }

        let raw_landmarks = outputs[0].try_extract_array::<f32>()?;
        let presence = outputs[1].try_extract_array::<f32>()?;
        let handedness_score = outputs[2].try_extract_array::<f32>()?;

        let coords = raw_landmarks
            .as_slice()
            .ok_or("Cannot get landmark slice")?;
        if coords.len() < LANDMARK_COUNT * 3 {
            return Err(format!(
                "hand landmark model returned {} values, expected {}",
                coords.len(),
                LANDMARK_COUNT * 3
            )
            .into());
        }

        let presence = presence.iter().next().copied().unwrap_or(0.0);
        let handedness_score = handedness_score.iter().next().copied().unwrap_or(0.0);
        let handedness = if handedness_score >= RIGHT_HAND_THRESHOLD {
            Handedness::Right
        } else {
            Handedness::Left
        };

        // 3. Map crop-space landmarks back into frame-normalized coords
        let fw = frame.width() as f32;
        let fh = frame.height() as f32;
        let mut points = Vec::with_capacity(LANDMARK_COUNT);
        for chunk in coords.chunks_exact(3).take(LANDMARK_COUNT) {
            let nu = chunk[0] / INPUT_SIZE as f32 - 0.5;
            let nv = chunk[1] / INPUT_SIZE as f32 - 0.5;
            let (px, py) = roi_to_frame(roi, fw, fh, nu, nv);
            points.push(Landmark::new(
                px / fw,
                py / fh,
                // z stays crop-relative; counting and drawing never read it
                chunk[2] / INPUT_SIZE as f32,
            ));
        }

        let observation = HandObservation::from_points(handedness, &points)?;
        Ok(LandmarkPrediction {
            observation,
            presence,
        })
    }
}

// ---------------------------------------------------------------------------
// Crop transform
// ---------------------------------------------------------------------------

/// Map a crop-centered normalized offset (`nu`, `nv` in [-0.5, 0.5]) to
/// frame pixel coordinates through the ROI's rotation.
fn roi_to_frame(roi: &HandRoi, fw: f32, fh: f32, nu: f32, nv: f32) -> (f32, f32) {
    let (sin_r, cos_r) = roi.rotation.sin_cos();
    let w_px = roi.width * fw;
    let h_px = roi.height * fh;
    let x = roi.cx * fw + nu * w_px * cos_r - nv * h_px * sin_r;
    let y = roi.cy * fh + nu * w_px * sin_r + nv * h_px * cos_r;
    (x, y)
}

/// Resample the oriented window to `size × size`, normalized [0,1] NCHW.
///
/// Nearest-neighbor sampling; source positions outside the frame stay 0
/// (zero padding, matching the model's training-time crop behavior).
fn crop_roi(frame: &Frame, roi: &HandRoi, size: u32) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let fw = frame.width() as f32;
    let fh = frame.height() as f32;
    let src_w = frame.width() as i64;
    let src_h = frame.height() as i64;
    let s = size as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));

    for v in 0..s {
        let nv = (v as f32 + 0.5) / s as f32 - 0.5;
        for u in 0..s {
            let nu = (u as f32 + 0.5) / s as f32 - 0.5;
            let (x, y) = roi_to_frame(roi, fw, fh, nu, nv);
            let sx = x.floor() as i64;
            let sy = y.floor() as i64;
            if sx < 0 || sy < 0 || sx >= src_w || sy >= src_h {
                continue;
            }
            for c in 0..3 {
                tensor[[0, c, v, u]] = src[[sy as usize, sx as usize, c]] as f32 / 255.0;
            }
        }
    }

    tensor
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

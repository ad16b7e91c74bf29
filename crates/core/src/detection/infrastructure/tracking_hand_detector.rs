/// Two-stage hand detector with frame-to-frame region tracking.
///
/// Runs the palm detector to propose hand regions, the landmark model to
/// refine each region into 21 landmarks, and carries landmark-derived
/// regions into the next call so steady footage skips palm detection
/// entirely. The palm stage re-runs whenever fewer hands are tracked than
/// the configured maximum.
use crate::detection::domain::hand_detector::HandDetector;
use crate::detection::domain::hand_landmarks::{HandObservation, MIDDLE_FINGER_MCP, WRIST};
use crate::detection::infrastructure::onnx_hand_landmarker::{
    HandRoi, LandmarkPrediction, OnnxHandLandmarker,
};
use crate::detection::infrastructure::onnx_palm_detector::{
    OnnxPalmDetector, PalmDetection, KEYPOINT_MIDDLE_BASE, KEYPOINT_WRIST,
};
use crate::shared::frame::Frame;

/// Palm box to hand crop expansion factor.
const PALM_ROI_SCALE: f32 = 2.6;

/// Palm crop shift along the hand axis, in crop-size units (negative is
/// toward the fingers).
const PALM_ROI_SHIFT_Y: f32 = -0.5;

/// Landmark bounding box to next-frame crop expansion factor.
const LANDMARK_ROI_SCALE: f32 = 2.0;

/// Landmark crop shift along the hand axis, in crop-size units.
const LANDMARK_ROI_SHIFT_Y: f32 = -0.1;

/// Palm proposals overlapping a tracked region at or above this IoU are
/// the same hand and get dropped.
const ROI_DEDUP_IOU: f32 = 0.5;

/// Palm proposal stage. Split out as a trait so the tracking logic can be
/// tested without an ONNX session.
pub trait PalmStage: Send {
    fn detect_palms(
        &mut self,
        frame: &Frame,
    ) -> Result<Vec<PalmDetection>, Box<dyn std::error::Error + Send + Sync>>;
}

impl PalmStage for OnnxPalmDetector {
    fn detect_palms(
        &mut self,
        frame: &Frame,
    ) -> Result<Vec<PalmDetection>, Box<dyn std::error::Error + Send + Sync>> {
        OnnxPalmDetector::detect_palms(self, frame)
    }
}

/// Landmark refinement stage.
pub trait LandmarkStage: Send {
    fn predict(
        &mut self,
        frame: &Frame,
        roi: &HandRoi,
    ) -> Result<LandmarkPrediction, Box<dyn std::error::Error + Send + Sync>>;
}

impl LandmarkStage for OnnxHandLandmarker {
    fn predict(
        &mut self,
        frame: &Frame,
        roi: &HandRoi,
    ) -> Result<LandmarkPrediction, Box<dyn std::error::Error + Send + Sync>> {
        OnnxHandLandmarker::predict(self, frame, roi)
    }
}

/// Stateful detector combining both stages with region reuse.
pub struct TrackingHandDetector {
    palm_detector: Box<dyn PalmStage>,
    landmarker: Box<dyn LandmarkStage>,
    max_hands: usize,
    tracking_confidence: f32,
    tracked_rois: Vec<HandRoi>,
}

impl TrackingHandDetector {
    /// `palm_detector` is expected to filter its own proposals by the
    /// detection confidence; `tracking_confidence` gates the landmark
    /// presence score here.
    pub fn new(
        palm_detector: Box<dyn PalmStage>,
        landmarker: Box<dyn LandmarkStage>,
        max_hands: usize,
        tracking_confidence: f32,
    ) -> Self {
        Self {
            palm_detector,
            landmarker,
            max_hands,
            tracking_confidence,
            tracked_rois: Vec::new(),
        }
    }
}

impl HandDetector for TrackingHandDetector {
    fn detect(
        &mut self,
        frame: &Frame,
    ) -> Result<Vec<HandObservation>, Box<dyn std::error::Error + Send + Sync>> {
        let fw = frame.width() as f32;
        let fh = frame.height() as f32;

        let mut rois = std::mem::take(&mut self.tracked_rois);

        // Top up with palm proposals when fewer hands are tracked than
        // allowed; proposals covering an already-tracked hand are dropped.
        if rois.len() < self.max_hands {
            let palms = self.palm_detector.detect_palms(frame)?;
            for palm in &palms {
                if rois.len() >= self.max_hands {
                    break;
                }
                let candidate = roi_from_palm(palm, fw, fh);
                let duplicate = rois
                    .iter()
                    .any(|roi| roi_iou(roi, &candidate) >= ROI_DEDUP_IOU);
                if !duplicate {
                    rois.push(candidate);
                }
            }
        }

        let mut observations = Vec::new();
        let mut next_rois = Vec::new();
        for roi in &rois {
            let prediction = self.landmarker.predict(frame, roi)?;
            if prediction.presence < self.tracking_confidence {
                continue;
            }
            next_rois.push(roi_from_landmarks(&prediction.observation, fw, fh));
            observations.push(prediction.observation);
        }

        self.tracked_rois = next_rois;
        Ok(observations)
    }
}

// ---------------------------------------------------------------------------
// Region derivation
// ---------------------------------------------------------------------------

/// Rotation that makes the wrist→middle-finger axis point up in the crop.
/// `dx`/`dy` are the axis components in pixels, image y pointing down.
fn hand_rotation(dx: f32, dy: f32) -> f32 {
    dx.atan2(-dy)
}

/// Build a square crop window around a pixel-space center, shifted by
/// `shift_y` crop-sizes along the rotated hand axis.
fn oriented_roi(
    cx_px: f32,
    cy_px: f32,
    side_px: f32,
    rotation: f32,
    shift_y: f32,
    fw: f32,
    fh: f32,
) -> HandRoi {
    let (sin_r, cos_r) = rotation.sin_cos();
    let dx = -shift_y * side_px * sin_r;
    let dy = shift_y * side_px * cos_r;
    HandRoi {
        cx: (cx_px + dx) / fw,
        cy: (cy_px + dy) / fh,
        width: side_px / fw,
        height: side_px / fh,
        rotation,
    }
}

/// Expand a palm proposal into a full-hand crop window.
fn roi_from_palm(palm: &PalmDetection, fw: f32, fh: f32) -> HandRoi {
    let w_px = (palm.x2 - palm.x1) * fw;
    let h_px = (palm.y2 - palm.y1) * fh;
    let side = w_px.max(h_px) * PALM_ROI_SCALE;
    let cx_px = (palm.x1 + palm.x2) / 2.0 * fw;
    let cy_px = (palm.y1 + palm.y2) / 2.0 * fh;

    let (wx, wy) = palm.keypoints[KEYPOINT_WRIST];
    let (mx, my) = palm.keypoints[KEYPOINT_MIDDLE_BASE];
    let rotation = hand_rotation((mx - wx) * fw, (my - wy) * fh);

    oriented_roi(cx_px, cy_px, side, rotation, PALM_ROI_SHIFT_Y, fw, fh)
}

/// Derive the next-frame crop window from this frame's landmarks.
fn roi_from_landmarks(observation: &HandObservation, fw: f32, fh: f32) -> HandRoi {
    let landmarks = observation.landmarks();

    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for lm in landmarks {
        min_x = min_x.min(lm.x);
        min_y = min_y.min(lm.y);
        max_x = max_x.max(lm.x);
        max_y = max_y.max(lm.y);
    }

    let w_px = (max_x - min_x) * fw;
    let h_px = (max_y - min_y) * fh;
    let side = w_px.max(h_px) * LANDMARK_ROI_SCALE;
    let cx_px = (min_x + max_x) / 2.0 * fw;
    let cy_px = (min_y + max_y) / 2.0 * fh;

    let wrist = landmarks[WRIST];
    let middle = landmarks[MIDDLE_FINGER_MCP];
    let rotation = hand_rotation((middle.x - wrist.x) * fw, (middle.y - wrist.y) * fh);

    oriented_roi(cx_px, cy_px, side, rotation, LANDMARK_ROI_SHIFT_Y, fw, fh)
}

/// Axis-aligned IoU between two crop windows. Rotation is ignored; at the
/// overlap levels that matter for dedup the approximation is fine.
fn roi_iou(a: &HandRoi, b: &HandRoi) -> f32 {
    let x1 = (a.cx - a.width / 2.0).max(b.cx - b.width / 2.0);
    let y1 = (a.cy - a.height / 2.0).max(b.cy - b.height / 2.0);
    let x2 = (a.cx + a.width / 2.0).min(b.cx + b.width / 2.0);
    let y2 = (a.cy + a.height / 2.0).min(b.cy + b.height / 2.0);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = a.width * a.height;
    let area_b = b.width * b.height;
    inter / (area_a + area_b - inter)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::hand_landmarks::{
        Handedness, Landmark, LANDMARK_COUNT, PINKY_MCP, THUMB_CMC,
    };
    use crate::detection::infrastructure::onnx_palm_detector::PALM_KEYPOINTS;
    use approx::assert_relative_eq;
    use std::sync::{Arc, Mutex};

    // ── Stub stages ──

    struct StubPalmStage {
        detections: Vec<PalmDetection>,
        calls: Arc<Mutex<usize>>,
    }

    impl PalmStage for StubPalmStage {
        fn detect_palms(
            &mut self,
            _frame: &Frame,
        ) -> Result<Vec<PalmDetection>, Box<dyn std::error::Error + Send + Sync>> {
            *self.calls.lock().unwrap() += 1;
            Ok(self.detections.clone())
        }
    }

    struct StubLandmarkStage {
        prediction: LandmarkPrediction,
        calls: Arc<Mutex<usize>>,
    }

    impl LandmarkStage for StubLandmarkStage {
        fn predict(
            &mut self,
            _frame: &Frame,
            _roi: &HandRoi,
        ) -> Result<LandmarkPrediction, Box<dyn std::error::Error + Send + Sync>> {
            *self.calls.lock().unwrap() += 1;
            Ok(self.prediction.clone())
        }
    }

    // ── Fixtures ──

    fn test_frame() -> Frame {
        Frame::new(vec![0u8; 100 * 100 * 3], 100, 100, 3)
    }

    fn stub_palm() -> PalmDetection {
        let mut keypoints = [(0.5f32, 0.5f32); PALM_KEYPOINTS];
        keypoints[KEYPOINT_WRIST] = (0.5, 0.6);
        keypoints[KEYPOINT_MIDDLE_BASE] = (0.5, 0.4);
        PalmDetection {
            x1: 0.4,
            y1: 0.4,
            x2: 0.6,
            y2: 0.6,
            keypoints,
            score: 0.9,
        }
    }

    /// Landmarks whose derived crop window lands exactly on the window
    /// derived from `stub_palm`, so re-proposals of the same hand dedup.
    fn stub_observation() -> HandObservation {
        let mut points = [Landmark::new(0.5, 0.3, 0.0); LANDMARK_COUNT];
        points[WRIST] = Landmark::new(0.5, 0.422, 0.0);
        points[MIDDLE_FINGER_MCP] = Landmark::new(0.5, 0.162, 0.0);
        points[THUMB_CMC] = Landmark::new(0.37, 0.3, 0.0);
        points[PINKY_MCP] = Landmark::new(0.63, 0.3, 0.0);
        HandObservation::new(Handedness::Right, points)
    }

    fn build_tracker(
        detections: Vec<PalmDetection>,
        presence: f32,
        max_hands: usize,
    ) -> (TrackingHandDetector, Arc<Mutex<usize>>, Arc<Mutex<usize>>) {
        let palm_calls = Arc::new(Mutex::new(0));
        let landmark_calls = Arc::new(Mutex::new(0));
        let tracker = TrackingHandDetector::new(
            Box::new(StubPalmStage {
                detections,
                calls: Arc::clone(&palm_calls),
            }),
            Box::new(StubLandmarkStage {
                prediction: LandmarkPrediction {
                    observation: stub_observation(),
                    presence,
                },
                calls: Arc::clone(&landmark_calls),
            }),
            max_hands,
            0.7,
        );
        (tracker, palm_calls, landmark_calls)
    }

    // ── Region derivation ──

    #[test]
    fn test_hand_rotation_upright_hand_is_zero() {
        // Fingers above the wrist: axis points up, no rotation needed
        assert_relative_eq!(hand_rotation(0.0, -20.0), 0.0);
    }

    #[test]
    fn test_hand_rotation_sideways_hand_is_quarter_turn() {
        assert_relative_eq!(
            hand_rotation(20.0, 0.0),
            std::f32::consts::FRAC_PI_2,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_roi_from_palm_expands_and_shifts_toward_fingers() {
        let roi = roi_from_palm(&stub_palm(), 100.0, 100.0);
        assert_relative_eq!(roi.rotation, 0.0, epsilon = 1e-6);
        assert_relative_eq!(roi.width, 0.52, epsilon = 1e-4);
        assert_relative_eq!(roi.height, 0.52, epsilon = 1e-4);
        assert_relative_eq!(roi.cx, 0.5, epsilon = 1e-4);
        // Shifted up from the palm center (0.5) toward the fingers
        assert_relative_eq!(roi.cy, 0.24, epsilon = 1e-4);
    }

    #[test]
    fn test_roi_from_landmarks_matches_palm_roi_for_fixture() {
        let from_palm = roi_from_palm(&stub_palm(), 100.0, 100.0);
        let from_landmarks = roi_from_landmarks(&stub_observation(), 100.0, 100.0);
        assert!(roi_iou(&from_palm, &from_landmarks) > 0.95);
    }

    #[test]
    fn test_roi_iou_identical_is_one() {
        let roi = roi_from_palm(&stub_palm(), 100.0, 100.0);
        assert_relative_eq!(roi_iou(&roi, &roi), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_roi_iou_disjoint_is_zero() {
        let a = HandRoi {
            cx: 0.2,
            cy: 0.2,
            width: 0.2,
            height: 0.2,
            rotation: 0.0,
        };
        let b = HandRoi {
            cx: 0.8,
            cy: 0.8,
            width: 0.2,
            height: 0.2,
            rotation: 0.0,
        };
        assert_relative_eq!(roi_iou(&a, &b), 0.0);
    }

    // ── Tracking behavior ──

    #[test]
    fn test_detects_hand_from_palm_proposal() {
        let (mut tracker, palm_calls, landmark_calls) =
            build_tracker(vec![stub_palm()], 0.95, 2);

        let observations = tracker.detect(&test_frame()).unwrap();

        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].handedness(), Handedness::Right);
        assert_eq!(*palm_calls.lock().unwrap(), 1);
        assert_eq!(*landmark_calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_tracked_hand_skips_palm_stage() {
        let (mut tracker, palm_calls, _) = build_tracker(vec![stub_palm()], 0.95, 1);

        tracker.detect(&test_frame()).unwrap();
        let observations = tracker.detect(&test_frame()).unwrap();

        assert_eq!(observations.len(), 1);
        // Second call is fully tracked, palm detection never re-runs
        assert_eq!(*palm_calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_low_presence_drops_hand_and_redetects() {
        let (mut tracker, palm_calls, _) = build_tracker(vec![stub_palm()], 0.3, 1);

        let first = tracker.detect(&test_frame()).unwrap();
        let second = tracker.detect(&test_frame()).unwrap();

        assert!(first.is_empty());
        assert!(second.is_empty());
        assert_eq!(*palm_calls.lock().unwrap(), 2);
    }

    #[test]
    fn test_max_hands_caps_proposals() {
        let mut left = stub_palm();
        left.x1 = 0.0;
        left.x2 = 0.2;
        let mut middle = stub_palm();
        middle.x1 = 0.4;
        middle.x2 = 0.6;
        let mut right = stub_palm();
        right.x1 = 0.75;
        right.x2 = 0.95;

        let (mut tracker, _, landmark_calls) =
            build_tracker(vec![left, middle, right], 0.95, 2);

        let observations = tracker.detect(&test_frame()).unwrap();

        assert_eq!(observations.len(), 2);
        assert_eq!(*landmark_calls.lock().unwrap(), 2);
    }

    #[test]
    fn test_duplicate_proposal_suppressed_while_tracking() {
        let (mut tracker, palm_calls, landmark_calls) =
            build_tracker(vec![stub_palm()], 0.95, 2);

        tracker.detect(&test_frame()).unwrap();
        // One hand tracked out of two allowed: the palm stage re-runs, but
        // its proposal covers the tracked hand and is dropped
        let observations = tracker.detect(&test_frame()).unwrap();

        assert_eq!(observations.len(), 1);
        assert_eq!(*palm_calls.lock().unwrap(), 2);
        assert_eq!(*landmark_calls.lock().unwrap(), 2);
    }

    #[test]
    fn test_no_palms_yields_no_hands() {
        let (mut tracker, palm_calls, landmark_calls) = build_tracker(vec![], 0.95, 2);

        let observations = tracker.detect(&test_frame()).unwrap();

        assert!(observations.is_empty());
        assert_eq!(*palm_calls.lock().unwrap(), 1);
        assert_eq!(*landmark_calls.lock().unwrap(), 0);
    }
}

pub const PALM_MODEL_NAME: &str = "palm_detection_full.onnx";
pub const PALM_MODEL_URL: &str =
    "https://github.com/neutrinographics/handtally/releases/download/v0.1.0/palm_detection_full.onnx";

pub const LANDMARK_MODEL_NAME: &str = "hand_landmark_full.onnx";
pub const LANDMARK_MODEL_URL: &str =
    "https://github.com/neutrinographics/handtally/releases/download/v0.1.0/hand_landmark_full.onnx";

/// Largest upload the decoder accepts; the HTTP body limit mirrors this.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

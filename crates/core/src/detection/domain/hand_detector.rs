use crate::detection::domain::hand_landmarks::HandObservation;
use crate::shared::frame::Frame;

/// Domain interface for hand landmark detection.
///
/// Implementations may be stateful (e.g., reusing regions of interest
/// across calls in video mode), hence `&mut self`. Errors are `Send + Sync`
/// so callers can run detection on a blocking worker thread.
pub trait HandDetector: Send {
    fn detect(
        &mut self,
        frame: &Frame,
    ) -> Result<Vec<HandObservation>, Box<dyn std::error::Error + Send + Sync>>;
}

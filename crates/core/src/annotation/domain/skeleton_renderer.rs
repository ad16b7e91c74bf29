use crate::detection::domain::hand_landmarks::HandObservation;
use crate::shared::frame::Frame;

/// Domain interface for drawing hand landmarks and skeleton connections
/// onto a frame.
///
/// Implementations modify the frame in-place (`&mut Frame`) to avoid allocation.
pub trait SkeletonRenderer: Send {
    fn draw(
        &self,
        frame: &mut Frame,
        hands: &[HandObservation],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

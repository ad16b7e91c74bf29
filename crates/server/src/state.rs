use std::sync::{Arc, Mutex};
use std::time::Duration;

use handtally_core::pipeline::recognize_use_case::RecognizeUseCase;

/// Shared handler state.
///
/// The whole pipeline sits behind one mutex: the detector carries tracked
/// hand regions between calls, so requests serialize through it and each
/// request sees the tracker state its predecessor left behind.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Mutex<RecognizeUseCase>>,
    /// Artificial processing delay, for exercising client loading states.
    pub delay: Duration,
}

impl AppState {
    pub fn new(pipeline: RecognizeUseCase, delay: Duration) -> Self {
        Self {
            pipeline: Arc::new(Mutex::new(pipeline)),
            delay,
        }
    }
}

use std::time::Instant;

use thiserror::Error;

use crate::annotation::domain::skeleton_renderer::SkeletonRenderer;
use crate::codec::domain::codec_error::CodecError;
use crate::codec::domain::image_decoder::ImageDecoder;
use crate::codec::domain::image_encoder::ImageEncoder;
use crate::counting::finger_counter::count_fingers;
use crate::detection::domain::hand_detector::HandDetector;
use crate::detection::domain::hand_landmarks::Handedness;
use crate::pipeline::pipeline_logger::PipelineLogger;

/// Errors from one recognition pass, by pipeline stage.
#[derive(Error, Debug)]
pub enum RecognizeError {
    #[error(transparent)]
    Decode(CodecError),
    #[error("hand detection failed: {0}")]
    Detect(Box<dyn std::error::Error + Send + Sync>),
    #[error("overlay drawing failed: {0}")]
    Render(Box<dyn std::error::Error + Send + Sync>),
    #[error(transparent)]
    Encode(CodecError),
}

/// Finger count for one hand in the processed frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FingerCount {
    pub handedness: Handedness,
    /// Extended fingers as the digit string "0" through "5".
    pub digit: String,
}

/// Result of one recognition pass.
#[derive(Clone, Debug)]
pub struct Recognition {
    /// Mirrored, annotated frame as a `data:` URI.
    pub image_data: String,
    /// One entry per detected hand, in detector order.
    pub hands: Vec<FingerCount>,
}

/// Single-image recognition pipeline:
/// decode → mirror → detect → count → draw → encode.
///
/// The frame is mirrored before detection so the output matches what a
/// user expects from a selfie camera, and the handedness labels follow
/// the mirrored view.
pub struct RecognizeUseCase {
    decoder: Box<dyn ImageDecoder>,
    detector: Box<dyn HandDetector>,
    renderer: Box<dyn SkeletonRenderer>,
    encoder: Box<dyn ImageEncoder>,
    logger: Box<dyn PipelineLogger>,
}

impl RecognizeUseCase {
    pub fn new(
        decoder: Box<dyn ImageDecoder>,
        detector: Box<dyn HandDetector>,
        renderer: Box<dyn SkeletonRenderer>,
        encoder: Box<dyn ImageEncoder>,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            decoder,
            detector,
            renderer,
            encoder,
            logger,
        }
    }

    /// Process one uploaded image and return the annotated frame plus a
    /// finger count per detected hand.
    pub fn execute(&mut self, bytes: &[u8]) -> Result<Recognition, RecognizeError> {
        let start = Instant::now();
        let mut frame = self.decoder.decode(bytes).map_err(RecognizeError::Decode)?;
        self.log_stage("decode", start);

        let start = Instant::now();
        frame.mirror_horizontal();
        self.log_stage("mirror", start);

        let start = Instant::now();
        let observations = self
            .detector
            .detect(&frame)
            .map_err(RecognizeError::Detect)?;
        self.log_stage("detect", start);

        let hands = observations
            .iter()
            .map(|obs| FingerCount {
                handedness: obs.handedness(),
                digit: count_fingers(obs),
            })
            .collect();

        let start = Instant::now();
        self.renderer
            .draw(&mut frame, &observations)
            .map_err(RecognizeError::Render)?;
        self.log_stage("draw", start);

        let start = Instant::now();
        let encoded = self.encoder.encode(&frame).map_err(RecognizeError::Encode)?;
        self.log_stage("encode", start);

        Ok(Recognition {
            image_data: encoded.to_data_uri(),
            hands,
        })
    }

    /// Emit the logger's lifetime summary (called at shutdown).
    pub fn log_summary(&self) {
        self.logger.summary();
    }

    fn log_stage(&mut self, stage: &str, start: Instant) {
        self.logger
            .timing(stage, start.elapsed().as_secs_f64() * 1000.0);
    }
}

use crate::codec::domain::codec_error::CodecError;
use crate::shared::frame::Frame;

/// Domain interface for turning uploaded image bytes into an RGB frame.
pub trait ImageDecoder: Send {
    fn decode(&self, bytes: &[u8]) -> Result<Frame, CodecError>;
}
